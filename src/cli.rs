use clap::{Args, Parser, Subcommand};

use grow_spaces::{Dimensions, GrowError, LightCycle, NewGrowSpace, NoteDate, Plant, PlantType, Stage};

#[derive(Parser)]
#[command(name = "grow-spaces")]
#[command(about = "Track grow spaces, their plants and a dated grow journal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in and cache the identity for later commands
    Login {
        #[arg(long)]
        user: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// Sign out and clear the cached identity
    Logout,
    /// Show grow spaces (all, or one by ID)
    View {
        #[arg(long)]
        id: Option<String>,
        /// Only print IDs and names
        #[arg(long)]
        ids: bool,
    },
    /// Add a new grow space
    Add(AddArgs),
    /// Edit an existing grow space and its plants
    Update(UpdateArgs),
    /// Remove a grow space
    Remove {
        #[arg(long)]
        id: String,
    },
    /// Manage the dated notes of a grow space
    #[command(subcommand)]
    Note(NoteCommand),
}

#[derive(Args, Debug)]
pub struct AddArgs {
    #[arg(short = 'n', long)]
    pub name: Option<String>,
    #[arg(long, default_value = "")]
    pub width: String,
    #[arg(long, default_value = "")]
    pub length: String,
    #[arg(long, default_value = "")]
    pub height: String,
    /// Power draw in watts
    #[arg(short = 'p', long)]
    pub power: Option<u32>,
    /// One of 24/0, 20/4, 18/6, 16/8, 14/10, 12/12
    #[arg(short = 'l', long)]
    pub light_cycle: Option<LightCycle>,
    /// One of seedling, veg, flower
    #[arg(short = 's', long)]
    pub stage: Option<Stage>,
}

impl From<AddArgs> for NewGrowSpace {
    fn from(args: AddArgs) -> Self {
        NewGrowSpace {
            name: args.name.unwrap_or_default(),
            dimensions: Dimensions {
                width: args.width,
                length: args.length,
                height: args.height,
            },
            power: args.power,
            light_cycle: args.light_cycle,
            stage: args.stage,
        }
    }
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    #[arg(long)]
    pub id: String,
    #[arg(short, long)]
    pub name: Option<String>,
    #[arg(long)]
    pub width: Option<String>,
    #[arg(long)]
    pub length: Option<String>,
    #[arg(long)]
    pub height: Option<String>,
    #[arg(short, long)]
    pub power: Option<u32>,
    #[arg(short, long)]
    pub light_cycle: Option<LightCycle>,
    #[arg(short, long)]
    pub stage: Option<Stage>,
    /// Plant to append, as name:type:potSize (repeatable)
    #[arg(long, value_parser = parse_plant)]
    pub add_plant: Vec<Plant>,
    /// Position of a plant to remove, counted before any additions (repeatable)
    #[arg(long)]
    pub remove_plant: Vec<usize>,
}

#[derive(Subcommand, Debug)]
pub enum NoteCommand {
    /// List every note of a grow space
    List {
        #[arg(long)]
        space: String,
    },
    /// Show the note for a date (default: today)
    Show {
        #[arg(long)]
        space: String,
        #[arg(long)]
        date: Option<NoteDate>,
    },
    /// Write the note for a date, replacing any existing one
    Set {
        #[arg(long)]
        space: String,
        #[arg(long)]
        date: Option<NoteDate>,
        #[arg(long)]
        text: String,
    },
    /// Delete the note for a date
    Delete {
        #[arg(long)]
        space: String,
        #[arg(long)]
        date: Option<NoteDate>,
    },
}

pub fn parse_plant(raw: &str) -> Result<Plant, String> {
    let mut parts = raw.splitn(3, ':');
    let name = parts.next().unwrap_or_default().trim();
    let plant_type = parts.next().unwrap_or_default();
    let pot_size = parts.next().unwrap_or_default().trim();
    if name.is_empty() {
        return Err(format!("plant '{raw}' has no name"));
    }
    let plant_type = plant_type
        .parse::<PlantType>()
        .map_err(|e: GrowError| e.to_string())?;
    Ok(Plant::new(name, plant_type, pot_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plant_spec() {
        let plant = parse_plant("OG Kush:clone:5gal").unwrap();
        assert_eq!(plant, Plant::new("OG Kush", PlantType::Clone, "5gal"));
        assert_eq!(parse_plant("Auto:seed").unwrap().pot_size, "");
        assert!(parse_plant(":seed:1gal").is_err());
        assert!(parse_plant("Auto:cutting:1gal").is_err());
    }

    #[test]
    fn update_collects_repeated_plant_flags() {
        let cli = Cli::try_parse_from([
            "grow-spaces",
            "update",
            "--id",
            "abc",
            "--add-plant",
            "A:seed:1gal",
            "--add-plant",
            "B:clone:3gal",
            "--remove-plant",
            "0",
            "--light-cycle",
            "12/12",
        ])
        .unwrap();
        let Commands::Update(args) = cli.command else {
            panic!("expected update");
        };
        assert_eq!(args.add_plant.len(), 2);
        assert_eq!(args.remove_plant, vec![0]);
        assert_eq!(args.light_cycle, Some(LightCycle::H12_12));
    }

    #[test]
    fn add_leaves_validation_to_the_manager() {
        let cli = Cli::try_parse_from(["grow-spaces", "add", "--name", "Tent A"]).unwrap();
        let Commands::Add(args) = cli.command else {
            panic!("expected add");
        };
        let fields = NewGrowSpace::from(args);
        assert!(fields.validate("u1").is_err());
    }
}
