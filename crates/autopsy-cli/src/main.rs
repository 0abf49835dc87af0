use autopsy_cli::{command, exit_code, init_logging, run, Action, EXIT_FAILURE};
use tracing::error;

fn main() {
    let matches = command().get_matches();
    init_logging(matches.get_flag("verbose"), matches.get_flag("log-json"));

    let Some(action) = Action::from_matches(&matches) else {
        std::process::exit(EXIT_FAILURE);
    };

    match run(&action) {
        Ok(out) => println!("{}", out.trim_end()),
        Err(err) => {
            error!("{err:#}");
            eprintln!("error: {err:#}");
            std::process::exit(exit_code(&err));
        }
    }
}
