// src/banner.rs

/// Prints the application startup banner to the console.
pub fn print_banner() {
    let banner = r#"
 _            _                  _
| |_ __ _ ___| | _____ _   _ __ _| |
| __/ _` / __| |/ / _ \ \ / / _` | |
| || (_| \__ \   <  __/\ V / (_| | |
 \__\__,_|___/_|\_\___| \_/ \__,_|_|

    LLM Task Evaluation Service
"#;
    println!("{}", banner);
}
