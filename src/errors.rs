use std::fmt;

#[derive(Debug, Clone)]
pub enum ViewPulseError {
    CacheConnection(String),
    CachePluginNotFound(String),
    DatabaseConfig(String),
    DatabaseConnection(String),
    DatabaseOperation(String),
    FileOperation(String),
    Validation(String),
    NotFound(String),
    Authentication(String),
    TransientStorage(String),
    Serialization(String),
    DateParse(String),
    Aggregation(String),
}

impl ViewPulseError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            ViewPulseError::CacheConnection(_) => "E001",
            ViewPulseError::CachePluginNotFound(_) => "E002",
            ViewPulseError::DatabaseConfig(_) => "E003",
            ViewPulseError::DatabaseConnection(_) => "E004",
            ViewPulseError::DatabaseOperation(_) => "E005",
            ViewPulseError::FileOperation(_) => "E006",
            ViewPulseError::Validation(_) => "E007",
            ViewPulseError::NotFound(_) => "E008",
            ViewPulseError::Authentication(_) => "E009",
            ViewPulseError::TransientStorage(_) => "E010",
            ViewPulseError::Serialization(_) => "E011",
            ViewPulseError::DateParse(_) => "E012",
            ViewPulseError::Aggregation(_) => "E013",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            ViewPulseError::CacheConnection(_) => "Cache Connection Error",
            ViewPulseError::CachePluginNotFound(_) => "Cache Plugin Not Found",
            ViewPulseError::DatabaseConfig(_) => "Database Configuration Error",
            ViewPulseError::DatabaseConnection(_) => "Database Connection Error",
            ViewPulseError::DatabaseOperation(_) => "Database Operation Error",
            ViewPulseError::FileOperation(_) => "File Operation Error",
            ViewPulseError::Validation(_) => "Validation Error",
            ViewPulseError::NotFound(_) => "Resource Not Found",
            ViewPulseError::Authentication(_) => "Authentication Error",
            ViewPulseError::TransientStorage(_) => "Transient Storage Error",
            ViewPulseError::Serialization(_) => "Serialization Error",
            ViewPulseError::DateParse(_) => "Date Parse Error",
            ViewPulseError::Aggregation(_) => "Aggregation Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            ViewPulseError::CacheConnection(msg) => msg,
            ViewPulseError::CachePluginNotFound(msg) => msg,
            ViewPulseError::DatabaseConfig(msg) => msg,
            ViewPulseError::DatabaseConnection(msg) => msg,
            ViewPulseError::DatabaseOperation(msg) => msg,
            ViewPulseError::FileOperation(msg) => msg,
            ViewPulseError::Validation(msg) => msg,
            ViewPulseError::NotFound(msg) => msg,
            ViewPulseError::Authentication(msg) => msg,
            ViewPulseError::TransientStorage(msg) => msg,
            ViewPulseError::Serialization(msg) => msg,
            ViewPulseError::DateParse(msg) => msg,
            ViewPulseError::Aggregation(msg) => msg,
        }
    }

    /// 调用方可以稍后重试的错误
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ViewPulseError::TransientStorage(_)
                | ViewPulseError::DatabaseConnection(_)
                | ViewPulseError::CacheConnection(_)
        )
    }

    /// 请求本身被拒绝（不会写入任何数据）
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ViewPulseError::Validation(_)
                | ViewPulseError::NotFound(_)
                | ViewPulseError::Authentication(_)
        )
    }

    /// 格式化为彩色输出（用于 Server 模式）
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出（用于 CLI 模式）
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for ViewPulseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 默认使用简洁格式
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for ViewPulseError {}

// 便捷的构造函数
impl ViewPulseError {
    pub fn cache_connection<T: Into<String>>(msg: T) -> Self {
        ViewPulseError::CacheConnection(msg.into())
    }

    pub fn cache_plugin_not_found<T: Into<String>>(msg: T) -> Self {
        ViewPulseError::CachePluginNotFound(msg.into())
    }

    pub fn database_config<T: Into<String>>(msg: T) -> Self {
        ViewPulseError::DatabaseConfig(msg.into())
    }

    pub fn database_connection<T: Into<String>>(msg: T) -> Self {
        ViewPulseError::DatabaseConnection(msg.into())
    }

    pub fn database_operation<T: Into<String>>(msg: T) -> Self {
        ViewPulseError::DatabaseOperation(msg.into())
    }

    pub fn file_operation<T: Into<String>>(msg: T) -> Self {
        ViewPulseError::FileOperation(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        ViewPulseError::Validation(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        ViewPulseError::NotFound(msg.into())
    }

    pub fn authentication<T: Into<String>>(msg: T) -> Self {
        ViewPulseError::Authentication(msg.into())
    }

    pub fn transient_storage<T: Into<String>>(msg: T) -> Self {
        ViewPulseError::TransientStorage(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        ViewPulseError::Serialization(msg.into())
    }

    pub fn date_parse<T: Into<String>>(msg: T) -> Self {
        ViewPulseError::DateParse(msg.into())
    }

    pub fn aggregation<T: Into<String>>(msg: T) -> Self {
        ViewPulseError::Aggregation(msg.into())
    }
}

// 为常见的错误类型实现 From trait
impl From<sea_orm::DbErr> for ViewPulseError {
    fn from(err: sea_orm::DbErr) -> Self {
        // 连接类错误对调用方而言是暂时性的
        if crate::storage::backend::retry::is_transient(&err) {
            ViewPulseError::TransientStorage(err.to_string())
        } else {
            ViewPulseError::DatabaseOperation(err.to_string())
        }
    }
}

impl From<std::io::Error> for ViewPulseError {
    fn from(err: std::io::Error) -> Self {
        ViewPulseError::FileOperation(err.to_string())
    }
}

impl From<serde_json::Error> for ViewPulseError {
    fn from(err: serde_json::Error) -> Self {
        ViewPulseError::Serialization(err.to_string())
    }
}

impl From<chrono::ParseError> for ViewPulseError {
    fn from(err: chrono::ParseError) -> Self {
        ViewPulseError::DateParse(err.to_string())
    }
}

impl From<redis::RedisError> for ViewPulseError {
    fn from(err: redis::RedisError) -> Self {
        ViewPulseError::CacheConnection(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ViewPulseError>;
