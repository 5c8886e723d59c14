use lazy_static::lazy_static;
use regex::Regex;

#[derive(Debug)]
pub struct Config {
    pub api_base_url: String,
    pub socket_path: String,
    pub rate_limit_per_sec: u32,
    pub max_retries: u32,
    pub restart_cap: u32,
    pub container_filter: Regex,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(val) if !val.is_empty() => val
            .parse()
            .unwrap_or_else(|_| panic!("Invalid value for {}", key)),
        _ => default,
    }
}

lazy_static! {
    pub static ref CONFIG: Config = {
        let api_base_url = std::env::var("ST_API_BASE_URL")
            .unwrap_or_else(|_| "https://api.spacetraders.io/v2".to_string());
        let socket_path = std::env::var("ST_SOCKET_PATH")
            .unwrap_or_else(|_| "/tmp/st-daemon.sock".to_string());
        let container_filter = match std::env::var("CONTAINER_KIND_FILTER") {
            Ok(val) if !val.is_empty() => {
                Regex::new(&val).expect("Invalid CONTAINER_KIND_FILTER regex")
            }
            _ => Regex::new(".*").expect("Invalid default regex"),
        };
        Config {
            api_base_url,
            socket_path,
            rate_limit_per_sec: env_parse("ST_RATE_LIMIT_PER_SEC", 2),
            max_retries: env_parse("ST_MAX_RETRIES", 3),
            restart_cap: env_parse("ST_RESTART_CAP", 5),
            container_filter,
        }
    };
}
