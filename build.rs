use std::env;
use std::fs;
use std::path::Path;

// Solo estas claves llegan a `option_env!` en src/config.rs
const FORWARDED_PREFIXES: &[&str] = &["SYNC_", "BACKEND_URL"];

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=.env");

    let env_file = Path::new(".env");
    let contents = match fs::read_to_string(env_file) {
        Ok(contents) => contents,
        // Sin .env se usan los valores por defecto de SyncConfig
        Err(_) => return,
    };

    for line in contents.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim().trim_matches('"');

        if !FORWARDED_PREFIXES.iter().any(|prefix| key.starts_with(prefix)) {
            continue;
        }

        // Una variable ya definida en el entorno tiene prioridad sobre .env
        if env::var(key).is_err() {
            println!("cargo:rustc-env={}={}", key, value);
        }
    }
}
