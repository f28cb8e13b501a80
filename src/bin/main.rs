use dotenv::dotenv;

use clap::{Arg, Command};

use diario_back::{app::*, error::*};

fn cli() -> Command {
  Command::new("diario-back")
    .about("News and services backend.")
    .arg(Arg::new("config")
      .short('c')
      .long("config")
      .value_name("FILE")
      .global(true)
      .help("Config file to load instead of conf/<RUN_MODE>"))
    .subcommand(Command::new("serve")
      .about("Run the HTTP servers (default)"))
    .subcommand(Command::new("seed")
      .about("Create the schema and seed lookup tables"))
}

fn main() -> Result<()> {
  dotenv().ok();
  env_logger::init();

  let cli = cli().get_matches();

  let config = AppConfig::new_clap(&cli)?;

  match cli.subcommand_name() {
    Some("seed") => seed::execute(config)?,
    // default to 'serve' command.
    _ => serve::execute(config)?,
  }
  log::info!("Main finished");
  Ok(())
}
