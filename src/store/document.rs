//! The persisted state blob and the names of its record arrays.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

pub const CURRENT_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserPreferences {
    pub theme: String,
    pub sidebar_collapsed: bool,
    pub notifications: bool,
    pub auto_save: bool,
    pub keyboard_shortcuts: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            theme: "system".to_string(),
            sidebar_collapsed: false,
            notifications: true,
            auto_save: true,
            keyboard_shortcuts: true,
            extra: Map::new(),
        }
    }
}

/// Data one tool publishes for the others.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrossToolData {
    pub shared_connections: Vec<Value>,
    pub exported_queries: Vec<Value>,
    /// Newest first.
    pub api_responses: Vec<Value>,
    pub global_variables: Map<String, Value>,
}

/// Everything the tools persist, in one JSON document.
///
/// Records are kept as raw JSON objects; the only structure the store relies
/// on is an optional `id` per record. Keys this version does not know about
/// survive a load/save cycle through `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageDocument {
    pub version: String,
    pub api_requests: Vec<Value>,
    pub web_socket_connections: Vec<Value>,
    pub mock_endpoints: Vec<Value>,
    pub json_formats: Vec<Value>,
    pub base64_conversions: Vec<Value>,
    pub sql_queries: Vec<Value>,
    pub database_connections: Vec<Value>,
    pub mongo_queries: Vec<Value>,
    pub mongo_templates: Vec<Value>,
    pub mongo_schemas: Vec<Value>,
    pub npm_analyses: Vec<Value>,
    pub environment_configs: Vec<Value>,
    pub visual_queries: Vec<Value>,
    pub query_templates: Vec<Value>,
    pub database_schemas: Vec<Value>,
    pub connection_templates: Vec<Value>,
    pub env_environments: Vec<Value>,
    pub env_templates: Vec<Value>,
    pub env_backups: Vec<Value>,
    pub cloud_provider_configs: Vec<Value>,
    pub favorite_tools: Vec<Value>,
    /// Newest first.
    pub recent_tools: Vec<Value>,
    pub platform_errors: Vec<Value>,
    pub integration_settings: Map<String, Value>,
    pub user_preferences: UserPreferences,
    pub cross_tool_data: CrossToolData,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for StorageDocument {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION.to_string(),
            api_requests: Vec::new(),
            web_socket_connections: Vec::new(),
            mock_endpoints: Vec::new(),
            json_formats: Vec::new(),
            base64_conversions: Vec::new(),
            sql_queries: Vec::new(),
            database_connections: Vec::new(),
            mongo_queries: Vec::new(),
            mongo_templates: Vec::new(),
            mongo_schemas: Vec::new(),
            npm_analyses: Vec::new(),
            environment_configs: Vec::new(),
            visual_queries: Vec::new(),
            query_templates: Vec::new(),
            database_schemas: Vec::new(),
            connection_templates: Vec::new(),
            env_environments: Vec::new(),
            env_templates: Vec::new(),
            env_backups: Vec::new(),
            cloud_provider_configs: Vec::new(),
            favorite_tools: Vec::new(),
            recent_tools: Vec::new(),
            platform_errors: Vec::new(),
            integration_settings: Map::new(),
            user_preferences: UserPreferences::default(),
            cross_tool_data: CrossToolData::default(),
            extra: Map::new(),
        }
    }
}

impl StorageDocument {
    pub fn records(&self, c: Collection) -> &Vec<Value> {
        match c {
            Collection::ApiRequests => &self.api_requests,
            Collection::WebSocketConnections => &self.web_socket_connections,
            Collection::MockEndpoints => &self.mock_endpoints,
            Collection::JsonFormats => &self.json_formats,
            Collection::Base64Conversions => &self.base64_conversions,
            Collection::SqlQueries => &self.sql_queries,
            Collection::DatabaseConnections => &self.database_connections,
            Collection::MongoQueries => &self.mongo_queries,
            Collection::MongoTemplates => &self.mongo_templates,
            Collection::MongoSchemas => &self.mongo_schemas,
            Collection::NpmAnalyses => &self.npm_analyses,
            Collection::EnvironmentConfigs => &self.environment_configs,
            Collection::VisualQueries => &self.visual_queries,
            Collection::QueryTemplates => &self.query_templates,
            Collection::DatabaseSchemas => &self.database_schemas,
            Collection::ConnectionTemplates => &self.connection_templates,
            Collection::EnvEnvironments => &self.env_environments,
            Collection::EnvTemplates => &self.env_templates,
            Collection::EnvBackups => &self.env_backups,
            Collection::CloudProviderConfigs => &self.cloud_provider_configs,
            Collection::FavoriteTools => &self.favorite_tools,
            Collection::RecentTools => &self.recent_tools,
            Collection::PlatformErrors => &self.platform_errors,
        }
    }

    pub fn records_mut(&mut self, c: Collection) -> &mut Vec<Value> {
        match c {
            Collection::ApiRequests => &mut self.api_requests,
            Collection::WebSocketConnections => &mut self.web_socket_connections,
            Collection::MockEndpoints => &mut self.mock_endpoints,
            Collection::JsonFormats => &mut self.json_formats,
            Collection::Base64Conversions => &mut self.base64_conversions,
            Collection::SqlQueries => &mut self.sql_queries,
            Collection::DatabaseConnections => &mut self.database_connections,
            Collection::MongoQueries => &mut self.mongo_queries,
            Collection::MongoTemplates => &mut self.mongo_templates,
            Collection::MongoSchemas => &mut self.mongo_schemas,
            Collection::NpmAnalyses => &mut self.npm_analyses,
            Collection::EnvironmentConfigs => &mut self.environment_configs,
            Collection::VisualQueries => &mut self.visual_queries,
            Collection::QueryTemplates => &mut self.query_templates,
            Collection::DatabaseSchemas => &mut self.database_schemas,
            Collection::ConnectionTemplates => &mut self.connection_templates,
            Collection::EnvEnvironments => &mut self.env_environments,
            Collection::EnvTemplates => &mut self.env_templates,
            Collection::EnvBackups => &mut self.env_backups,
            Collection::CloudProviderConfigs => &mut self.cloud_provider_configs,
            Collection::FavoriteTools => &mut self.favorite_tools,
            Collection::RecentTools => &mut self.recent_tools,
            Collection::PlatformErrors => &mut self.platform_errors,
        }
    }

    pub fn record_count(&self) -> usize {
        Collection::ALL.iter().map(|c| self.records(*c).len()).sum()
    }
}

/// Record id as a string. Numeric ids compare by their decimal form.
pub fn record_id(record: &Value) -> Option<String> {
    match record.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A named record array of [`StorageDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    ApiRequests,
    WebSocketConnections,
    MockEndpoints,
    JsonFormats,
    Base64Conversions,
    SqlQueries,
    DatabaseConnections,
    MongoQueries,
    MongoTemplates,
    MongoSchemas,
    NpmAnalyses,
    EnvironmentConfigs,
    VisualQueries,
    QueryTemplates,
    DatabaseSchemas,
    ConnectionTemplates,
    EnvEnvironments,
    EnvTemplates,
    EnvBackups,
    CloudProviderConfigs,
    FavoriteTools,
    RecentTools,
    PlatformErrors,
}

impl Collection {
    pub const ALL: [Collection; 23] = [
        Collection::ApiRequests,
        Collection::WebSocketConnections,
        Collection::MockEndpoints,
        Collection::JsonFormats,
        Collection::Base64Conversions,
        Collection::SqlQueries,
        Collection::DatabaseConnections,
        Collection::MongoQueries,
        Collection::MongoTemplates,
        Collection::MongoSchemas,
        Collection::NpmAnalyses,
        Collection::EnvironmentConfigs,
        Collection::VisualQueries,
        Collection::QueryTemplates,
        Collection::DatabaseSchemas,
        Collection::ConnectionTemplates,
        Collection::EnvEnvironments,
        Collection::EnvTemplates,
        Collection::EnvBackups,
        Collection::CloudProviderConfigs,
        Collection::FavoriteTools,
        Collection::RecentTools,
        Collection::PlatformErrors,
    ];

    /// Key in the persisted JSON.
    pub fn key(self) -> &'static str {
        match self {
            Collection::ApiRequests => "apiRequests",
            Collection::WebSocketConnections => "webSocketConnections",
            Collection::MockEndpoints => "mockEndpoints",
            Collection::JsonFormats => "jsonFormats",
            Collection::Base64Conversions => "base64Conversions",
            Collection::SqlQueries => "sqlQueries",
            Collection::DatabaseConnections => "databaseConnections",
            Collection::MongoQueries => "mongoQueries",
            Collection::MongoTemplates => "mongoTemplates",
            Collection::MongoSchemas => "mongoSchemas",
            Collection::NpmAnalyses => "npmAnalyses",
            Collection::EnvironmentConfigs => "environmentConfigs",
            Collection::VisualQueries => "visualQueries",
            Collection::QueryTemplates => "queryTemplates",
            Collection::DatabaseSchemas => "databaseSchemas",
            Collection::ConnectionTemplates => "connectionTemplates",
            Collection::EnvEnvironments => "envEnvironments",
            Collection::EnvTemplates => "envTemplates",
            Collection::EnvBackups => "envBackups",
            Collection::CloudProviderConfigs => "cloudProviderConfigs",
            Collection::FavoriteTools => "favoriteTools",
            Collection::RecentTools => "recentTools",
            Collection::PlatformErrors => "platformErrors",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .into_iter()
            .find(|c| c.key().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown collection '{}'", s))
    }
}

/// A tool that owns one record array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    ApiTester,
    WebsocketTester,
    MockServer,
    JsonFormatter,
    Base64,
    SqlQueryBuilder,
    ConnectionStringBuilder,
    MongodbQueryBuilder,
    NpmPackageAnalyzer,
    EnvironmentVariableManager,
}

impl Tool {
    pub const ALL: [Tool; 10] = [
        Tool::ApiTester,
        Tool::WebsocketTester,
        Tool::MockServer,
        Tool::JsonFormatter,
        Tool::Base64,
        Tool::SqlQueryBuilder,
        Tool::ConnectionStringBuilder,
        Tool::MongodbQueryBuilder,
        Tool::NpmPackageAnalyzer,
        Tool::EnvironmentVariableManager,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Tool::ApiTester => "api-tester",
            Tool::WebsocketTester => "websocket-tester",
            Tool::MockServer => "mock-server",
            Tool::JsonFormatter => "json-formatter",
            Tool::Base64 => "base64",
            Tool::SqlQueryBuilder => "sql-query-builder",
            Tool::ConnectionStringBuilder => "connection-string-builder",
            Tool::MongodbQueryBuilder => "mongodb-query-builder",
            Tool::NpmPackageAnalyzer => "npm-package-analyzer",
            Tool::EnvironmentVariableManager => "environment-variable-manager",
        }
    }

    pub fn collection(self) -> Collection {
        match self {
            Tool::ApiTester => Collection::ApiRequests,
            Tool::WebsocketTester => Collection::WebSocketConnections,
            Tool::MockServer => Collection::MockEndpoints,
            Tool::JsonFormatter => Collection::JsonFormats,
            Tool::Base64 => Collection::Base64Conversions,
            Tool::SqlQueryBuilder => Collection::SqlQueries,
            Tool::ConnectionStringBuilder => Collection::DatabaseConnections,
            Tool::MongodbQueryBuilder => Collection::MongoQueries,
            Tool::NpmPackageAnalyzer => Collection::NpmAnalyses,
            Tool::EnvironmentVariableManager => Collection::EnvEnvironments,
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Tool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tool::ALL
            .into_iter()
            .find(|t| t.id() == s)
            .ok_or_else(|| format!("unknown tool '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Api,
    Data,
    Database,
    Development,
}

impl Category {
    pub fn collections(self) -> &'static [Collection] {
        match self {
            Category::Api => &[
                Collection::ApiRequests,
                Collection::WebSocketConnections,
                Collection::MockEndpoints,
            ],
            Category::Data => &[Collection::JsonFormats, Collection::Base64Conversions],
            Category::Database => &[
                Collection::SqlQueries,
                Collection::DatabaseConnections,
                Collection::MongoQueries,
                Collection::VisualQueries,
            ],
            Category::Development => &[Collection::NpmAnalyses, Collection::EnvEnvironments],
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "api" => Ok(Category::Api),
            "data" => Ok(Category::Data),
            "database" => Ok(Category::Database),
            "development" => Ok(Category::Development),
            other => Err(format!(
                "unknown category '{}' (expected api, data, database or development)",
                other
            )),
        }
    }
}
