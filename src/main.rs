use rowpack::cli;
use rowpack::display::{self, Styles};

fn main() {
    env_logger::init();
    match cli::run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            display::print_error(&Styles::auto(), &format!("{err:#}"));
            std::process::exit(1);
        }
    }
}
