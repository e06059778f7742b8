use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use wsh::{ShellError, Shell};
use wsh_client::{HttpSession, MemorySession, RemoteSession};
use wsh_config::WshConfig;

const SLOW_LINE: Duration = Duration::from_millis(500);

/// wsh - Interactive shell for remote containerized workloads
#[derive(Parser, Debug)]
#[command(name = "wsh", version, about)]
struct Args {
    /// Service manager gateway URL
    #[arg(short, long, env = "WSH_ENDPOINT")]
    endpoint: Option<String>,

    /// Bearer token for the gateway
    #[arg(short, long, env = "WSH_TOKEN")]
    token: Option<String>,

    /// Configuration file (default: search standard locations)
    #[arg(long)]
    config: Option<String>,

    /// Execute command and exit
    #[arg(short = 'c')]
    command: Option<String>,

    /// Run against an empty in-memory session instead of a gateway
    #[arg(long)]
    memory: bool,

    /// Script file to execute
    script: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => wsh_config::load_from_file(path)?,
        None => wsh_config::load().unwrap_or_else(|e| {
            eprintln!("wsh: ignoring configuration: {e}");
            WshConfig::default()
        }),
    };
    init_tracing(config.logging.directive());

    let session = connect(&args, &config)?;
    let mut shell = Shell::builder(session)
        .home(config.shell.home.clone())
        .user(config.shell.user.clone())
        .history_size(config.shell.history.max_entries)
        .build();

    let history_path = config
        .shell
        .history
        .enabled
        .then(|| config.shell.history.resolved_file());
    if let Some(path) = &history_path {
        if let Err(e) = shell.history.load(path) {
            tracing::warn!(path = %path.display(), error = %e, "failed to load history");
        }
    }

    let code = if let Some(command) = args.command {
        run_once(&mut shell, &command).await
    } else if let Some(script_path) = args.script {
        match std::fs::read_to_string(&script_path) {
            Ok(content) => run_script(&mut shell, &content).await,
            Err(e) => {
                eprintln!("wsh: cannot read '{script_path}': {e}");
                1
            }
        }
    } else {
        run_repl(&mut shell, &config).await?
    };

    if let Some(path) = &history_path {
        save_history(&shell, path);
    }
    std::process::exit(code);
}

fn init_tracing(directive: &str) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| directive.to_string());
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();
}

fn connect(args: &Args, config: &WshConfig) -> Result<Arc<dyn RemoteSession>, Box<dyn std::error::Error>> {
    if args.memory {
        tracing::info!("using in-memory session");
        return Ok(Arc::new(MemorySession::new().with_dir(&config.shell.home)));
    }

    // Endpoint priority: CLI arg > env > config
    let endpoint = args
        .endpoint
        .clone()
        .unwrap_or_else(|| config.remote.endpoint.clone());
    let mut builder =
        HttpSession::builder(&endpoint).timeout(Duration::from_secs(config.remote.timeout_secs));
    match args.token.as_ref().or(config.remote.token.as_ref()) {
        Some(token) if token.trim().is_empty() => {
            eprintln!("Error: Token is empty.");
            std::process::exit(1);
        }
        Some(token) => builder = builder.token(token.clone()),
        None => {}
    }
    tracing::info!(endpoint = %endpoint, "connecting to gateway");
    Ok(Arc::new(builder.build()?))
}

fn save_history(shell: &Shell, path: &std::path::Path) {
    if let Err(e) = shell.history.save(path) {
        tracing::warn!(path = %path.display(), error = %e, "failed to save history");
    }
}

/// Run one line, reporting errors. `Err` carries an exit request.
async fn run_line(shell: &mut Shell, line: &str) -> Result<i32, i32> {
    match shell.run_line(line).await {
        Ok(code) => Ok(code),
        Err(ShellError::Exit(code)) => Err(code),
        Err(e) => {
            shell.report(&format!("wsh: {e}"));
            shell.set_last_exit_code(1);
            Ok(1)
        }
    }
}

async fn run_once(shell: &mut Shell, command: &str) -> i32 {
    run_line(shell, command).await.unwrap_or_else(|code| code)
}

async fn run_script(shell: &mut Shell, content: &str) -> i32 {
    let mut code = 0;
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match run_line(shell, line).await {
            Ok(status) => code = status,
            Err(exit) => return exit,
        }
    }
    code
}

async fn run_repl(shell: &mut Shell, config: &WshConfig) -> Result<i32, Box<dyn std::error::Error>> {
    use rustyline::error::ReadlineError;
    use rustyline::{Config, DefaultEditor};

    let rl_config = Config::builder()
        .max_history_size(config.shell.history.max_entries)?
        .history_ignore_dups(true)?
        .history_ignore_space(true)
        .build();
    let mut rl = DefaultEditor::with_config(rl_config)?;
    for entry in shell.history.entries() {
        let _ = rl.add_history_entry(entry.as_str());
    }

    println!("wsh - Workload Shell v{}", env!("CARGO_PKG_VERSION"));
    println!("Type 'exit' to quit, 'help' for help.");
    println!();

    loop {
        let prompt = shell.prompt(&config.shell.prompt);
        match rl.readline(&prompt) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());

                let started = Instant::now();
                let outcome = tokio::select! {
                    result = run_line(shell, &line) => Some(result),
                    _ = tokio::signal::ctrl_c() => None,
                };
                match outcome {
                    Some(Ok(_)) => {}
                    Some(Err(code)) => return Ok(code),
                    None => {
                        println!("^C");
                        shell.set_last_exit_code(130);
                    }
                }

                let elapsed = started.elapsed();
                if elapsed >= SLOW_LINE {
                    eprintln!("Command executed in {:.3} seconds", elapsed.as_secs_f64());
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C (type 'exit' to quit)");
            }
            Err(ReadlineError::Eof) => {
                println!("exit");
                return Ok(shell.last_exit_code());
            }
            Err(err) => {
                eprintln!("Error: {err:?}");
                return Ok(1);
            }
        }
    }
}
