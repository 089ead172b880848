use clap::Parser;
use moodle_courses::task::close_within;
use moodle_courses::{
    Course, CourseStore, Credentials, Extraction, Mode, PortalConfig, TaskEvent, WebDriverPortal,
};
use std::error::Error;
use std::path::PathBuf;

mod args;
use args::{Args, Command, ExtractArgs};

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    // Parse command-line arguments
    let args = Args::parse();

    if let Err(e) = run(args).await {
        ::log::error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = match &args.config {
        Some(path) => PortalConfig::from_file(path)?,
        None => PortalConfig::default(),
    }
    .with_env_overrides();

    let store_path = args.store.clone().unwrap_or_else(CourseStore::default_path);

    match args.command {
        Command::Extract(extract) => run_extract(&config, store_path, extract).await,
        Command::List => {
            let store = CourseStore::open(store_path)?;
            print_courses(store.courses());
            Ok(())
        }
        Command::Add { name, url } => {
            let mut store = CourseStore::open(store_path)?;
            let filter = config.course_filter(&config.default_instance()?)?;
            store.add(Course::new(name, url), &filter)?;
            store.save()?;
            println!("Added. {} courses stored.", store.courses().len());
            Ok(())
        }
        Command::Remove { key } => {
            let mut store = CourseStore::open(store_path)?;
            let removed = store.remove(&key)?;
            store.save()?;
            println!("Removed {}", removed);
            Ok(())
        }
    }
}

async fn run_extract(
    config: &PortalConfig,
    store_path: PathBuf,
    args: ExtractArgs,
) -> Result<(), Box<dyn Error>> {
    let instance = match &args.year {
        Some(year) => config.instance(year)?,
        None => config.default_instance()?,
    };
    let mode: Mode = args.mode.into();
    let mut store = CourseStore::open(store_path)?;

    println!("Note: course extraction requires a WebDriver server (e.g., ChromeDriver).");
    println!(
        "Set WEBDRIVER_URL if not using {} (currently configured)",
        config.webdriver_url
    );

    let credentials = Credentials::new(args.username, args.password);
    let mut handle = Extraction::new(credentials, instance)
        .with_config(config)
        .spawn(WebDriverPortal::new(config));

    let mut cancel_requested = false;
    loop {
        tokio::select! {
            event = handle.next_event() => match event {
                Some(TaskEvent::Status(message)) => println!("{}", message),
                Some(TaskEvent::Finished(_)) | None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                if cancel_requested {
                    return Err("interrupted while cancelling".into());
                }
                println!("Cancelling... (press Ctrl-C again to quit immediately)");
                handle.cancel();
                cancel_requested = true;
            }
        }
    }

    let (mut portal, result) = handle.finish().await?;
    close_within(&mut portal, config.stage_timeout()).await;

    if !result.success {
        return Err(format!("Extraction failed: {}", result.detail()).into());
    }

    println!("{}", result.detail());

    if mode == Mode::Replace && result.courses.is_empty() && !args.force {
        return Err(
            "refusing to replace the stored list with nothing; pass --force to clear it".into(),
        );
    }

    let summary = store.apply(&result.courses, mode);
    let mut message = format!("Added: {}", summary.added);
    if summary.skipped > 0 {
        message.push_str(&format!(", Skipped (duplicates): {}", summary.skipped));
    }
    if summary.removed > 0 {
        message.push_str(&format!(", Removed: {}", summary.removed));
    }
    println!("{}", message);

    if args.dry_run {
        print_courses(store.courses());
        println!("Dry run, {} not modified", store.path().display());
    } else {
        store.save()?;
    }

    Ok(())
}

fn print_courses(courses: &[Course]) {
    if courses.is_empty() {
        println!("No courses stored.");
        return;
    }

    for (i, course) in courses.iter().enumerate() {
        println!("{}. {}", i + 1, course.name);
        println!("   URL: {}", course.url);
    }
}
