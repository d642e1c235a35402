use clap::Parser;

use stateseal::cli::{self, Cli, Commands};

fn main() {
    let args = Cli::parse();

    cli::context::init_logging(args.verbose, args.quiet);
    cli::output::set_quiet(args.quiet);

    let result = match &args.command {
        Commands::Encrypt {
            file,
            target,
            output,
        } => cli::commands::encrypt::execute(&args.config, file, target, output.as_deref()),
        Commands::Decrypt {
            file,
            target,
            output,
        } => cli::commands::decrypt::execute(&args.config, file, target, output.as_deref()),
        Commands::Inspect { file } => cli::commands::inspect::execute(file),
        Commands::Validate => cli::commands::validate::execute(&args.config),
    };

    if let Err(e) = result {
        cli::output::error(&format!("Error: {e}"));
        std::process::exit(1);
    }
}
