use crate::CLAP_STYLING;
use clap::arg;
use url::Url;

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("proxysift")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("proxysift")
        .about("Harvest public proxy lists and keep the proxies that actually relay traffic")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(arg!(-v --"verbose" "Log every failed probe").required(false))
        .arg(
            arg!(-s --"sources" <PATH>)
                .required(false)
                .help("Newline-delimited file of proxy list URLs (default: built-in list)")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(
            arg!(-o --"output" <DIR>)
                .required(false)
                .help("Directory for proxy.txt and working_proxies.txt")
                .default_value("."),
        )
        .arg(
            arg!(-T --"target" <URL>)
                .required(false)
                .help("Check URL requested through each proxy; repeat for several (default: two well-known HTTPS sites)")
                .value_parser(clap::value_parser!(Url))
                .action(clap::ArgAction::Append),
        )
        .arg(
            arg!(-t --"threads" <NUM_WORKERS>)
                .required(false)
                .help("Maximum number of proxies probed at once (default: sized from CPU and open-file limits)")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            arg!(--"timeout" <SECONDS>)
                .required(false)
                .help("Timeout for each request sent through a proxy")
                .value_parser(clap::value_parser!(u64))
                .default_value("10"),
        )
        .arg(
            arg!(--"deadline" <SECONDS>)
                .required(false)
                .help("Cancel probes still running after this long (default: wait for every probe)")
                .value_parser(clap::value_parser!(u64))
                .default_value("0"),
        )
        .arg(
            arg!(--"seed" <N>)
                .required(false)
                .help("Seed for header rotation and request pacing")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            arg!(--"strict-tls")
                .required(false)
                .help("Validate TLS certificates on requests sent through proxies")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            arg!(--"summary" <PATH>)
                .required(false)
                .help("Also write a JSON run summary to this file")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
}
