use proxysift::{command_argument_builder, handle_run};
use proxysift_core::print_banner;

#[tokio::main]
async fn main() {
    let matches = command_argument_builder().get_matches();

    // Show banner unless --quiet flag is set
    if !matches.get_flag("quiet") {
        print_banner();
    }

    if let Err(e) = handle_run(&matches).await {
        eprintln!("✗ {:#}", e);
        std::process::exit(1);
    }
}
