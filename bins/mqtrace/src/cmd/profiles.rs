use capture_store::DataRoot;

use crate::config::AppConfig;
use crate::error::CliError;

pub fn run(root: DataRoot) -> Result<(), CliError> {
    let app = AppConfig::load(&root.config_file())?;
    if app.profiles.is_empty() {
        println!("no profiles in {}", root.config_file().display());
        return Ok(());
    }
    let default = app.default_profile_name();
    for p in &app.profiles {
        let marker = if p.name == default { "*" } else { " " };
        println!("{marker} {}  {}", p.name, p.broker_url());
    }
    if let Some(addr) = &app.relay_addr {
        println!("relay: {addr}");
    }
    Ok(())
}
