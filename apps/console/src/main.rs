use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use collections_core::{
    config::load_settings,
    creation::CreationOutcome,
    deletion::DeletionOutcome,
    http::HttpCollectionStore,
    row_mutation::{SwitchControl, ToggleOutcome},
    CollectionStore, CollectionsTableController, ControllerDeps, FixedProject, PageRequest,
    PageState, QueryParams,
};
use shared::domain::{CollectionId, CollectionStatus, ProjectId};
use tracing_subscriber::EnvFilter;

mod headless;

use headless::{describe, FlagDialog, HeadlessNavigator};

#[derive(Parser, Debug)]
#[command(about = "Browse and manage the collections of a project")]
struct Args {
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    project_id: String,
    #[arg(long)]
    token: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    List {
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        cursor: Option<String>,
        #[arg(long, default_value_t = 1)]
        pages: usize,
    },
    Toggle {
        collection_id: String,
    },
    Delete {
        collection_id: String,
        #[arg(long)]
        yes: bool,
    },
    Create,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    if let Some(token) = args.token {
        settings.api_token = Some(token);
    }

    let initial_params = match &args.command {
        Command::List { limit, cursor, .. } => QueryParams {
            limit: limit.map(|limit| limit.to_string()),
            cursor: cursor.clone(),
        },
        _ => QueryParams::default(),
    };
    let assume_yes = matches!(args.command, Command::Delete { yes: true, .. });
    let store = Arc::new(HttpCollectionStore::from_settings(&settings));
    let project_id = ProjectId::new(args.project_id);

    // Resolved once before the table is attached, like the dashboard route does.
    let are_there_collections = !store
        .list_collections(&project_id, &PageRequest::first(1))
        .await?
        .data
        .is_empty();
    let navigator = Arc::new(HeadlessNavigator::new(initial_params, are_there_collections));

    let controller = CollectionsTableController::new(
        ControllerDeps {
            store,
            project: Arc::new(FixedProject(project_id)),
            navigator: navigator.clone(),
            dialog: Arc::new(FlagDialog { assume_yes }),
        },
        &settings,
    );

    match args.command {
        Command::List { pages, .. } => {
            if !controller.are_there_collections() {
                println!("no collections yet; run `create` to add the first one");
                return Ok(());
            }
            let mut state = settled(&controller).await?;
            print_page(&state);
            let paginator = controller.paginator();
            for _ in 1..pages {
                if !paginator.has_next() {
                    break;
                }
                paginator.next_page()?;
                state = controller.wait_for_fetch_after(state.generation).await?;
                ensure_loaded(&state)?;
                print_page(&state);
            }
        }
        Command::Toggle { collection_id } => {
            let collection_id = CollectionId::new(collection_id);
            let status = find_row(&controller, &collection_id).await?;
            let control = SwitchControl::for_status(status);
            match controller.toggle_status(&collection_id, &control).await? {
                ToggleOutcome::Updated { status } => {
                    println!("{collection_id} is now {status}");
                }
                ToggleOutcome::AlreadyPending => {
                    println!("{collection_id} already has a status change in flight");
                }
            }
        }
        Command::Delete { collection_id, .. } => {
            let collection_id = CollectionId::new(collection_id);
            find_row(&controller, &collection_id).await?;
            let generation = controller.state().generation;
            match controller.delete_collection(&collection_id).await? {
                DeletionOutcome::Deleted => {
                    let state = controller.wait_for_fetch_after(generation).await?;
                    println!("deleted {collection_id}");
                    print_page(&state);
                }
                DeletionOutcome::Dismissed => println!("nothing deleted"),
            }
        }
        Command::Create => match controller.create_collection().await? {
            CreationOutcome::Created { collection, flow } => {
                println!(
                    "created collection {} with flow {}",
                    collection.id, flow.id
                );
                if let Some(target) = navigator.visited().last() {
                    println!("open {}", describe(target));
                }
            }
            CreationOutcome::AlreadyInProgress => println!("a collection is already being created"),
        },
    }

    Ok(())
}

async fn settled(controller: &CollectionsTableController) -> Result<PageState> {
    let state = controller.wait_until_settled().await?;
    ensure_loaded(&state)?;
    Ok(state)
}

fn ensure_loaded(state: &PageState) -> Result<()> {
    match state.error() {
        Some(message) => Err(anyhow!(message.to_string())),
        None => Ok(()),
    }
}

/// Walks forward through the pages until the collection is displayed.
async fn find_row(
    controller: &CollectionsTableController,
    collection_id: &CollectionId,
) -> Result<CollectionStatus> {
    let paginator = controller.paginator();
    let mut state = settled(controller).await?;
    loop {
        if let Some(row) = state.row(collection_id) {
            return Ok(row.status);
        }
        if !paginator.has_next() {
            bail!("collection {collection_id} not found");
        }
        paginator.next_page()?;
        state = controller.wait_for_fetch_after(state.generation).await?;
        ensure_loaded(&state)?;
    }
}

fn print_page(state: &PageState) {
    println!(
        "page {} ({} rows so far)",
        state.page_index + 1,
        state.total_rows()
    );
    println!("{:<24} {:<32} {:<20} {}", "ID", "NAME", "CREATED", "STATUS");
    for row in &state.rows {
        println!(
            "{:<24} {:<32} {:<20} {}",
            row.id,
            row.display_name,
            row.created.format("%Y-%m-%d %H:%M"),
            row.status
        );
    }
}
