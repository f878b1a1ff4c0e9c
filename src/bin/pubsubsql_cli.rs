use std::{
    error::Error,
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use clap::Parser;
use pubsubsql::{
    Client, Command,
    cli::{OutputError, write_result},
    prompt,
};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Server address as host:port
    #[arg(default_value = "localhost:7777")]
    address: String,
    /// Milliseconds `.wait` and `.listen` block for a published message
    #[arg(long, default_value_t = 1000)]
    wait_timeout: u64,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();
    let listening = Arc::new(AtomicBool::new(false));

    // Ctrl-C stops `.listen`; anywhere else it quits.
    let handle = Arc::clone(&listening);
    ctrlc::set_handler(move || {
        if !handle.swap(false, Ordering::SeqCst) {
            std::process::exit(130);
        }
    })?;

    let mut client = Client::new();
    client.connect(&cli.address)?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    let default_timeout = Duration::from_millis(cli.wait_timeout);

    loop {
        let cmd = match prompt(stdin.lock(), stdout.lock()) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };

        let res: Result<(), OutputError> = match cmd {
            Command::Exit => break,
            Command::Execute(command) => client
                .execute(&command)
                .map_err(OutputError::from)
                .and_then(|_| write_result(&mut client, stdout.lock()).map(|_| ())),
            Command::Stream(command) => client.stream(&command).map_err(OutputError::from),
            Command::Wait(timeout) => {
                let timeout = timeout.map_or(default_timeout, Duration::from_millis);
                match client.wait_for_pubsub(timeout) {
                    Ok(true) => write_result(&mut client, stdout.lock()).map(|_| ()),
                    Ok(false) => {
                        println!("no message");
                        Ok(())
                    }
                    Err(e) => Err(e.into()),
                }
            }
            Command::Listen => {
                listening.store(true, Ordering::SeqCst);
                let mut res = Ok(());
                while listening.load(Ordering::SeqCst) {
                    match client.wait_for_pubsub(default_timeout) {
                        Ok(true) => {
                            if let Err(e) = write_result(&mut client, stdout.lock()) {
                                res = Err(e);
                                break;
                            }
                        }
                        Ok(false) => {}
                        Err(e) => {
                            res = Err(e.into());
                            break;
                        }
                    }
                }
                listening.store(false, Ordering::SeqCst);
                res
            }
        };

        if let Err(e) = res {
            eprintln!("error: {e}");
            if !client.is_connected() {
                break;
            }
        }
    }

    client.disconnect();
    Ok(())
}
