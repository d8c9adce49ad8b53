//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `RELAY__*` 覆盖（双下划线表示嵌套，如 `RELAY__RUN__MAX_TOOL_ROUNDS=4`）。
//! 凭据另外回退到 `OPENAI_API_KEY` / `ASSISTANT_ID` / `TAVILY_API_KEY`。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::core::RelayError;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub assistant: AssistantSection,
    #[serde(default)]
    pub run: RunSection,
    #[serde(default)]
    pub tools: ToolsSection,
}

/// [app] 段：界面文案与日志文件
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_about")]
    pub about: String,
    #[serde(default = "default_input_placeholder")]
    pub input_placeholder: String,
    /// TUI 占用终端，日志写入文件
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            title: default_title(),
            about: default_about(),
            input_placeholder: default_input_placeholder(),
            log_file: default_log_file(),
        }
    }
}

fn default_title() -> String {
    "Langgraph Coding Assistant".to_string()
}

fn default_about() -> String {
    "The Langgraph Coding Assistant is a tool designed to help developers with Langgraph-related \
     coding questions and issues. It provides guidance, explanations, and code suggestions for \
     working with Langgraph agents."
        .to_string()
}

fn default_input_placeholder() -> String {
    "Ask a question about Langgraph...".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("assistant-relay.log")
}

/// [assistant] 段：远端 Assistant 服务
#[derive(Debug, Clone, Deserialize)]
pub struct AssistantSection {
    pub assistant_id: Option<String>,
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// 创建 Run 时是否声明本地工具。Run 级 tools 会整体替换 Assistant 上配置的工具
    /// （含 file_search / code_interpreter），默认 false，沿用远端配置
    #[serde(default = "default_advertise_tools")]
    pub advertise_tools: bool,
}

impl Default for AssistantSection {
    fn default() -> Self {
        Self {
            assistant_id: None,
            api_key: None,
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            advertise_tools: default_advertise_tools(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

fn default_advertise_tools() -> bool {
    false
}

/// [run] 段：轮询间隔、工具轮数上限、总时限、传输重试
#[derive(Debug, Clone, Deserialize)]
pub struct RunSection {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_retry_backoff_max_ms")]
    pub retry_backoff_max_ms: u64,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_tool_rounds: default_max_tool_rounds(),
            deadline_secs: default_deadline_secs(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            retry_backoff_max_ms: default_retry_backoff_max_ms(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_max_tool_rounds() -> usize {
    8
}

fn default_deadline_secs() -> u64 {
    300
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_retry_backoff_max_ms() -> u64 {
    5000
}

/// [tools] 段：单次工具超时、输出长度上限、搜索服务
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    /// 提交给远端的单条 ToolOutput 最大字符数，超出截断
    #[serde(default = "default_max_output_chars")]
    pub max_output_chars: usize,
    #[serde(default)]
    pub search: SearchSection,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
            max_output_chars: default_max_output_chars(),
            search: SearchSection::default(),
        }
    }
}

fn default_tool_timeout_secs() -> u64 {
    30
}

fn default_max_output_chars() -> usize {
    16000
}

/// [tools.search] 段：Tavily 搜索端点与参数
#[derive(Debug, Clone, Deserialize)]
pub struct SearchSection {
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
    pub api_key: Option<String>,
    #[serde(default = "default_search_depth")]
    pub search_depth: String,
    #[serde(default)]
    pub include_images: bool,
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            api_key: None,
            search_depth: default_search_depth(),
            include_images: false,
            timeout_secs: default_search_timeout_secs(),
        }
    }
}

fn default_search_endpoint() -> String {
    "https://api.tavily.com/search".to_string()
}

fn default_search_depth() -> String {
    "advanced".to_string()
}

fn default_search_timeout_secs() -> u64 {
    20
}

/// 启动所需的三项凭据（缺一不可）
#[derive(Debug, Clone)]
pub struct Credentials {
    pub openai_api_key: String,
    pub assistant_id: String,
    pub search_api_key: String,
}

impl AppConfig {
    /// 从配置与进程环境解析凭据；缺失时返回 Config 错误（启动即失败）
    pub fn credentials(&self) -> Result<Credentials, RelayError> {
        self.credentials_with(|key| std::env::var(key).ok())
    }

    /// 同 credentials，环境变量读取可替换（便于测试）
    pub fn credentials_with<F>(&self, env: F) -> Result<Credentials, RelayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |configured: &Option<String>, var: &str, what: &str| {
            configured
                .clone()
                .or_else(|| env(var))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    RelayError::Config(format!("{what} is missing (set it in config or {var})"))
                })
        };
        Ok(Credentials {
            openai_api_key: pick(&self.assistant.api_key, "OPENAI_API_KEY", "OpenAI API key")?,
            assistant_id: pick(&self.assistant.assistant_id, "ASSISTANT_ID", "Assistant ID")?,
            search_api_key: pick(&self.tools.search.api_key, "TAVILY_API_KEY", "Tavily API key")?,
        })
    }
}

impl RunSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

/// 从 config 目录加载配置，环境变量 RELAY__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 RELAY__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("RELAY")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.run.poll_interval(), Duration::from_millis(500));
        assert_eq!(cfg.tools.search.search_depth, "advanced");
        assert!(!cfg.tools.search.include_images);
        assert_eq!(cfg.assistant.base_url, "https://api.openai.com/v1");
        assert!(!cfg.assistant.advertise_tools);
    }

    #[test]
    fn test_load_from_explicit_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[run]\nmax_tool_rounds = 2\npoll_interval_ms = 50\n\n[tools.search]\nsearch_depth = \"basic\""
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.run.max_tool_rounds, 2);
        assert_eq!(cfg.run.poll_interval_ms, 50);
        assert_eq!(cfg.tools.search.search_depth, "basic");
        // 未指定的键保持默认
        assert_eq!(cfg.run.retry_attempts, 3);
    }

    #[test]
    fn test_credentials_fall_back_to_env() {
        let cfg = AppConfig::default();
        let creds = cfg
            .credentials_with(|key| match key {
                "OPENAI_API_KEY" => Some("sk-test".into()),
                "ASSISTANT_ID" => Some("asst_123".into()),
                "TAVILY_API_KEY" => Some("tvly-test".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(creds.openai_api_key, "sk-test");
        assert_eq!(creds.assistant_id, "asst_123");
        assert_eq!(creds.search_api_key, "tvly-test");
    }

    #[test]
    fn test_missing_assistant_id_is_config_error() {
        let mut cfg = AppConfig::default();
        cfg.assistant.api_key = Some("sk-test".into());
        cfg.tools.search.api_key = Some("tvly-test".into());
        let err = cfg.credentials_with(|_| None).unwrap_err();
        match err {
            RelayError::Config(msg) => assert!(msg.contains("Assistant ID")),
            other => panic!("Expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn test_blank_credential_counts_as_missing() {
        let mut cfg = AppConfig::default();
        cfg.assistant.api_key = Some("   ".into());
        assert!(cfg.credentials_with(|_| None).is_err());
    }
}
