use colored::Colorize;
use serde_json::Value;

pub fn print_body(body: &[u8], pretty: bool) {
    let parsed = if pretty {
        serde_json::from_slice::<Value>(body)
            .ok()
            .and_then(|value| serde_json::to_string_pretty(&value).ok())
    } else {
        None
    };
    match parsed {
        Some(text) => println!("{text}"),
        None => println!("{}", String::from_utf8_lossy(body)),
    }
}

pub fn print_success(msg: &str) {
    eprintln!("{} {}", "✓".green(), msg);
}

pub fn print_warning(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}
