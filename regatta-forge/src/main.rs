use std::collections::BTreeMap;

use clap::{Parser, Subcommand};
use log::error;
use regatta_forge::{Forge, Recipe};

/// Build native libraries from source recipes
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    /// File path to the recipe
    #[arg(short, long)]
    recipe: String,

    /// Directory holding archives, build trees and installs
    #[arg(long, default_value = "forge")]
    root: String,

    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run every step from download to install
    Cook,
    Download,
    Extract,
    Patch,
    Configure,
    Compile,
    Install,
    /// Print shell exports activating the installed library
    Env,
}

fn main() {
    let Args {
        recipe,
        root,
        commands,
    } = Args::parse();
    pretty_env_logger::init();
    let recipe = match Recipe::read(&recipe) {
        Ok(recipe) => recipe,
        Err(err) => {
            error!("Recipe error: {}", err);
            std::process::exit(1);
        }
    };
    let forge = Forge::new(recipe, root);
    let outcome = match commands {
        Commands::Cook => forge.cook(),
        Commands::Download => forge.download(),
        Commands::Extract => forge.extract(),
        Commands::Patch => forge.patch(),
        Commands::Configure => forge.configure(),
        Commands::Compile => forge.compile(),
        Commands::Install => forge.install(),
        Commands::Env => {
            let current: BTreeMap<String, String> = std::env::vars().collect();
            for line in forge.activation(&current).exports() {
                println!("{}", line);
            }
            Ok(())
        }
    };
    if let Err(err) = outcome {
        error!("Build error: {}", err);
        std::process::exit(1);
    }
}
