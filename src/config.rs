/// client configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// base url of the knowledge base api
    pub api_url: String,
    /// path of the multipart upload endpoint
    pub upload_path: String,
    /// path prefix of the name-existence check, the candidate name is appended
    pub name_check_path: String,
    /// path prefix of the collection-info endpoint, `/{name}/info` is appended
    pub info_path: String,
    /// multipart field carrying the target collection name
    pub index_field: String,
    /// number of tokio worker threads
    pub worker_threads: usize,
}

impl Config {
    /// load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let api_url = std::env::var("KB_API_URL")
            .unwrap_or_else(|_| {
                tracing::warn!("No KB_API_URL set, falling back to http://127.0.0.1:5010");
                "http://127.0.0.1:5010".to_string()
            });

        Self {
            // trailing slashes would double up when paths are joined
            api_url: api_url.trim_end_matches('/').to_string(),
            upload_path: std::env::var("KB_UPLOAD_PATH")
                .unwrap_or_else(|_| "/api/file/upload".to_string()),
            name_check_path: std::env::var("KB_NAME_CHECK_PATH")
                .unwrap_or_else(|_| "/api/indices/check_exist".to_string()),
            info_path: std::env::var("KB_INFO_PATH")
                .unwrap_or_else(|_| "/api/indices".to_string()),
            index_field: std::env::var("KB_INDEX_FIELD")
                .unwrap_or_else(|_| "index_name".to_string()),
            worker_threads: std::env::var("WORKER_THREADS")
                .ok()
                .and_then(|t| t.parse().ok())
                .filter(|t: &usize| *t > 0)
                .unwrap_or(2),
        }
    }

    /// join a configured path onto the api base url
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }
}
