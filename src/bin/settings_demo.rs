use authlane::settings::*;

fn main() -> anyhow::Result<()> {
    // Load settings from the default location
    let project_settings = parse_settings(None)?;
    println!("Loaded settings: {:?}", project_settings);
    println!("Valid: {:?}", project_settings.validate());

    // Attempt to load from an invalid path (expected to fail)
    let is_err = parse_settings(Some("")).is_err();
    println!("Error on invalid path: {:?}", is_err);

    // Attempt to load from a custom path, secrets may come from the environment
    // $ AUTHLANE__JWT__ACCESS_SECRET=a AUTHLANE__JWT__REFRESH_SECRET=b \
    //   cargo run --bin settings_demo -- --settings=settings/release.toml
    let cli = Cli::parse();
    let project_settings = parse_settings(cli.settings.as_deref())?;
    println!("Loaded settings: {:?}", project_settings);
    println!("Valid: {:?}", project_settings.validate());

    Ok(())
}
