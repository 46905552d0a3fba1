use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use grow_spaces::{
    AuthSession, Config, DimensionKey, FieldUpdate, GrowSpace, GrowSpaceManager, MongoStore, NoteDate,
    NotesManager, RecordStore, SessionCache, SessionProvider, User,
};

mod cli;
use cli::{Cli, Commands, NoteCommand, UpdateArgs};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,grow_spaces=debug")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    let session = Arc::new(AuthSession::new(Some(SessionCache::new(&config.session_cache))));
    if let Err(e) = session.restore_cached() {
        warn!(error = %e, "ignoring unreadable session cache");
    }

    match cli.command {
        Commands::Login { user, email } => {
            session.apply_auth_event(Some(User { uid: user.clone(), email }));
            println!("Signed in as '{}'", user);
            return Ok(());
        }
        Commands::Logout => {
            session.apply_auth_event(None);
            println!("Signed out");
            return Ok(());
        }
        command => {
            if session.current_user_id().is_none() {
                bail!("not signed in; run `grow-spaces login --user <id>` first");
            }
            let store: Arc<dyn RecordStore> = Arc::new(MongoStore::connect(&config).await?);
            info!(backend = store.backend_tag(), "record store ready");
            run(command, store, session).await
        }
    }
}

async fn run(command: Commands, store: Arc<dyn RecordStore>, session: Arc<AuthSession>) -> Result<()> {
    let mut grow = GrowSpaceManager::new(store.clone(), session);
    grow.reload().await?;

    match command {
        Commands::View { id, ids } => {
            let spaces: Vec<&GrowSpace> = match &id {
                Some(id) => grow.space(id).into_iter().collect(),
                None => grow.spaces().iter().collect(),
            };
            if spaces.is_empty() {
                println!("No grow spaces found");
            }
            for space in spaces {
                if ids {
                    println!("{}, '{}'", space.id, space.name);
                } else {
                    print_space(space);
                }
            }
        }
        Commands::Add(args) => {
            let space = grow.create(args.into()).await?;
            println!("Grow space added, ID: {}", space.id);
        }
        Commands::Update(args) => {
            let id = args.id.clone();
            apply_update(&mut grow, args)?;
            let space = grow.commit_edit(&id).await?;
            println!("Grow space {} updated ({} plants)", space.id, space.plants.len());
        }
        Commands::Remove { id } => {
            grow.delete(&id).await?;
            println!("Grow space {} removed", id);
        }
        Commands::Note(command) => run_note(command, &grow, store).await?,
        Commands::Login { .. } | Commands::Logout => bail!("session commands do not use the store"),
    }

    Ok(())
}

fn apply_update(grow: &mut GrowSpaceManager, args: UpdateArgs) -> Result<()> {
    grow.begin_edit(&args.id)?;

    if let Some(name) = args.name {
        grow.update_edit_field(FieldUpdate::Name(name))?;
    }
    if let Some(power) = args.power {
        grow.update_edit_field(FieldUpdate::Power(power))?;
    }
    if let Some(cycle) = args.light_cycle {
        grow.update_edit_field(FieldUpdate::LightCycle(cycle))?;
    }
    if let Some(stage) = args.stage {
        grow.update_edit_field(FieldUpdate::Stage(stage))?;
    }
    for (key, value) in [
        (DimensionKey::Width, args.width),
        (DimensionKey::Length, args.length),
        (DimensionKey::Height, args.height),
    ] {
        if let Some(value) = value {
            grow.update_dimension(key, value)?;
        }
    }

    // Highest index first so every position refers to the list as it was.
    let mut removals = args.remove_plant;
    removals.sort_unstable_by(|a, b| b.cmp(a));
    removals.dedup();
    for index in removals {
        if grow.remove_plant_from_scratch(index)?.is_none() {
            grow.cancel_edit();
            bail!("no plant at position {}", index);
        }
    }
    for plant in args.add_plant {
        grow.add_plant_to_scratch(plant)?;
    }
    Ok(())
}

async fn run_note(command: NoteCommand, grow: &GrowSpaceManager, store: Arc<dyn RecordStore>) -> Result<()> {
    let space_id = match &command {
        NoteCommand::List { space }
        | NoteCommand::Show { space, .. }
        | NoteCommand::Set { space, .. }
        | NoteCommand::Delete { space, .. } => space.clone(),
    };
    if grow.space(&space_id).is_none() {
        bail!("no grow space with ID {}", space_id);
    }

    let mut notes = NotesManager::new(store);
    notes.load_notes(&space_id).await?;

    match command {
        NoteCommand::List { .. } => {
            let all = notes.notes()?;
            if all.is_empty() {
                println!("No notes");
            }
            for (date, text) in all {
                println!("{}: {}", date, text);
            }
        }
        NoteCommand::Show { date, .. } => {
            let date = date.unwrap_or_else(NoteDate::today);
            let draft = notes.select_date(date)?.to_string();
            if draft.is_empty() && !notes.has_note(date) {
                println!("No note for {}", date);
            } else {
                println!("{}: {}", date, draft);
            }
        }
        NoteCommand::Set { date, text, .. } => {
            let date = date.unwrap_or_else(NoteDate::today);
            notes.save_note(date, text).await?;
            println!("Note saved for {}", date);
        }
        NoteCommand::Delete { date, .. } => {
            let date = date.unwrap_or_else(NoteDate::today);
            notes.delete_note(date).await?;
            println!("Note for {} deleted", date);
        }
    }
    Ok(())
}

fn print_space(space: &GrowSpace) {
    println!(
        "Name: '{}'\nDimensions: {}\nPower: {} W\nLight cycle: {}\nStage: {}\nID: '{}'",
        space.name, space.dimensions, space.power, space.light_cycle, space.stage, space.id,
    );
    if space.plants.is_empty() {
        println!("Plants: none");
    } else {
        println!("Plants ({}):", space.plants.len());
        for (i, plant) in space.plants.iter().enumerate() {
            println!(
                "  {}. {} ({}) - pot size: {}",
                i, plant.name, plant.plant_type, plant.pot_size
            );
        }
    }
    println!();
}
