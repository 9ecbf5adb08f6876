use std::env;
use std::process;
use std::time::Duration;

use rtmp_client::client::RtmpClient;

fn main() {
    let mut args: Vec<String> = env::args().collect();
    args.drain(0..1); // remove the executable

    if args.is_empty() {
        println!("No arguments provided.  Usage:");
        println!("    handshake-tester rtmp://<host>[:port]/<app>");
        process::exit(1);
    }

    let url = &args[0];
    println!("Connecting to {}", url);

    let mut client = match RtmpClient::connect(url, Duration::from_secs(10)) {
        Ok(client) => client,
        Err(error) => {
            println!("Connection failed: {}", error);
            process::exit(1);
        }
    };

    println!("Connected, starting handshake");
    match client.handshake() {
        Ok(()) => println!("Handshaking Completed!"),
        Err(error) => {
            println!("Handshake failed: {}", error);
            process::exit(1);
        }
    }
}
