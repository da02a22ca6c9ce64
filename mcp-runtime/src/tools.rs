use fanfou_core::shape::{self, MutationAction, labels};
use fanfou_core::{Credentials, FanfouError, TokenPair};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::client::{self, Endpoints};
use crate::image;
use crate::session::Session;

const DEFAULT_COUNT: i64 = 5;

const TEXT_CONVENTIONS: &str = "饭否内容为 HTML 格式：转发以「转@」开头，后跟被转发用户的链接（href 中为用户 ID，链接文字为显示名），可能有多个转发；话题以「#」包围，如 #<a href=\"/q/...\">话题名</a>#；内容末尾的「【审核中】」表示该内容正在审核中。";

#[derive(Debug)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: String,
    pub input_schema: Value,
}

impl ToolDefinition {
    pub fn to_value(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema,
        })
    }
}

pub fn tool_definitions() -> Vec<ToolDefinition> {
    let timeline_item = "每个元素包含：饭否内容、发布 ID、发布时间、发布者、发布者 ID，有图片时包含图片链接。";
    vec![
        ToolDefinition {
            name: "generate_oauth_token",
            description: "使用用户名密码通过 x_auth 生成 OAuth Token。需要 API Key、API Secret、用户名和密码；返回 oauth_token 与 oauth_token_secret，请保存后移除用户名密码配置。".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "get_home_timeline",
            description: format!(
                "获取当前用户首页时间线（关注的用户及自己的饭否）。通常用户询问「我的饭否」时指该时间线。{timeline_item}{TEXT_CONVENTIONS}"
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "count": { "type": "integer", "default": DEFAULT_COUNT, "description": "获取数量（上限由饭否服务端决定）" },
                    "max_id": { "type": "string", "description": "分页游标：返回比该 ID 更早的内容" }
                },
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "get_user_timeline",
            description: format!(
                "获取某个用户发表内容的时间线；user_id 为空时为当前用户。提供 q 时改为在该用户的内容中搜索关键词。{timeline_item}{TEXT_CONVENTIONS}"
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "user_id": { "type": "string", "description": "用户 ID，为空则为当前用户" },
                    "max_id": { "type": "string", "description": "分页游标：返回比该 ID 更早的内容" },
                    "count": { "type": "integer", "default": DEFAULT_COUNT, "description": "获取数量（上限由饭否服务端决定）" },
                    "q": { "type": "string", "description": "搜索关键词" }
                },
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "get_public_timeline",
            description: format!(
                "获取饭否全站公开时间线。提供 q 时改为搜索包含该关键词的公开内容。{timeline_item}{TEXT_CONVENTIONS}"
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "count": { "type": "integer", "default": DEFAULT_COUNT, "description": "获取数量（上限由饭否服务端决定）" },
                    "max_id": { "type": "string", "description": "分页游标：返回比该 ID 更早的内容" },
                    "q": { "type": "string", "description": "搜索关键词" }
                },
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "get_user_info",
            description: "获取用户资料；user_id 为空时为当前用户。包含用户 ID、用户名、显示名、位置、性别、生日、个人描述、头像链接、个人主页、是否加锁、粉丝数、关注数、收藏数、发布数、照片数、是否关注、注册时间及最新状态。".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "user_id": { "type": "string", "description": "用户 ID，为空则为当前用户" }
                },
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "get_status_info",
            description: format!(
                "获取某条饭否内容的详细信息：饭否内容、发布 ID、发布时间、发布者、发布者 ID、是否收藏、是否是自己、发布位置，回复时包含回复信息，有图片时包含图片链接和图片base64（data URL，大图超过 300KB 时使用普通尺寸）。{TEXT_CONVENTIONS}"
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "status_id": { "type": "string", "description": "饭否内容的 ID" },
                    "include_image": { "type": "boolean", "default": true, "description": "是否内联图片数据" }
                },
                "required": ["status_id"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "manage_favorite",
            description: "收藏（create）或取消收藏（destroy）饭否内容。需要 confirm=true，否则只返回确认请求，不执行操作。".to_string(),
            input_schema: mutation_schema(json!({
                "status_id": { "type": "string", "description": "饭否内容的 ID" },
                "action": { "type": "string", "enum": ["create", "destroy"] }
            }), &["status_id", "action"]),
        },
        ToolDefinition {
            name: "manage_friendship",
            description: "关注（create）或取消关注（destroy）用户。关注前会查询目标用户，若账号受保护则变为申请关注，需对方确认后生效。需要 confirm=true，否则只返回确认请求。".to_string(),
            input_schema: mutation_schema(json!({
                "user_id": { "type": "string", "description": "目标用户 ID" },
                "action": { "type": "string", "enum": ["create", "destroy"] }
            }), &["user_id", "action"]),
        },
        ToolDefinition {
            name: "publish_status",
            description: "发布纯文字饭否（最多 140 字）。发布后可能需要审核。需要 confirm=true，否则只返回确认请求。".to_string(),
            input_schema: mutation_schema(json!({
                "status": { "type": "string", "description": "要发布的文字内容" }
            }), &["status"]),
        },
        ToolDefinition {
            name: "publish_photo",
            description: "发布带图片的饭否：从 photo_url 下载图片后上传。需要 confirm=true，否则只返回确认请求。".to_string(),
            input_schema: mutation_schema(json!({
                "status": { "type": "string", "description": "要发布的文字内容" },
                "photo_url": { "type": "string", "description": "图片的网络地址" }
            }), &["status", "photo_url"]),
        },
        ToolDefinition {
            name: "delete_status",
            description: "删除自己发布的饭否内容。需要 confirm=true，否则只返回确认请求。".to_string(),
            input_schema: mutation_schema(json!({
                "status_id": { "type": "string", "description": "要删除的饭否内容 ID" }
            }), &["status_id"]),
        },
    ]
}

fn mutation_schema(properties: Value, required: &[&str]) -> Value {
    let mut properties = match properties {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    properties.insert(
        "confirm".to_string(),
        json!({ "type": "boolean", "default": false, "description": "用户确认后设为 true" }),
    );
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}

pub fn is_known_tool(name: &str) -> bool {
    tool_definitions().iter().any(|tool| tool.name == name)
}

#[derive(Debug, Error)]
#[error("unknown tool: {0}")]
pub struct UnknownTool(pub String);

/// Result of one tool call, already converted to data.
#[derive(Debug)]
pub struct ToolOutput {
    pub value: Value,
    pub is_error: bool,
    /// Set on the call that minted a token pair through password login.
    pub minted: Option<TokenPair>,
}

/// The canonical implementation of every tool, shared by all entry points.
///
/// Owns at most one session, opened on the first call that needs it.
#[derive(Debug)]
pub struct Toolbox {
    http: reqwest::Client,
    endpoints: Endpoints,
    credentials: Result<Credentials, FanfouError>,
    session: OnceCell<Session>,
}

impl Toolbox {
    pub fn new(endpoints: Endpoints, credentials: Result<Credentials, FanfouError>) -> Self {
        Self {
            http: client::http_client(),
            endpoints,
            credentials,
            session: OnceCell::new(),
        }
    }

    pub async fn call(&self, name: &str, args: &Map<String, Value>) -> Result<ToolOutput, UnknownTool> {
        if !is_known_tool(name) {
            return Err(UnknownTool(name.to_string()));
        }
        tracing::debug!(event = "tool_call", tool = name);

        let result = self.execute(name, args).await;
        let minted = self.session.get().and_then(Session::take_minted);
        Ok(match result {
            Ok(value) => ToolOutput {
                value,
                is_error: false,
                minted,
            },
            Err(err) => {
                let is_error = !matches!(err, FanfouError::ConfirmationRequired { .. });
                if is_error {
                    tracing::warn!(event = "tool_call_failed", tool = name, code = err.code(), error = %err);
                }
                ToolOutput {
                    value: err.to_value(),
                    is_error,
                    minted,
                }
            }
        })
    }

    async fn execute(&self, name: &str, args: &Map<String, Value>) -> Result<Value, FanfouError> {
        match name {
            "generate_oauth_token" => self.generate_oauth_token().await,
            "get_home_timeline" => self.get_home_timeline(args).await,
            "get_user_timeline" => self.get_user_timeline(args).await,
            "get_public_timeline" => self.get_public_timeline(args).await,
            "get_user_info" => self.get_user_info(args).await,
            "get_status_info" => self.get_status_info(args).await,
            "manage_favorite" => self.manage_favorite(args).await,
            "manage_friendship" => self.manage_friendship(args).await,
            "publish_status" => self.publish_status(args).await,
            "publish_photo" => self.publish_photo(args).await,
            "delete_status" => self.delete_status(args).await,
            other => Err(FanfouError::invalid_argument(
                "name",
                format!("unknown tool '{other}'"),
            )),
        }
    }

    fn credentials(&self) -> Result<&Credentials, FanfouError> {
        self.credentials.as_ref().map_err(|err| err.clone())
    }

    async fn session(&self) -> Result<&Session, FanfouError> {
        let credentials = self.credentials()?;
        self.session
            .get_or_try_init(|| Session::open(self.http.clone(), self.endpoints.clone(), credentials))
            .await
    }

    async fn generate_oauth_token(&self) -> Result<Value, FanfouError> {
        let credentials = self.credentials()?;
        let login = credentials.login()?;
        let pair = client::login(&self.http, &self.endpoints, credentials.consumer(), login).await?;
        tracing::info!(event = "oauth_token_generated", username = %login.username);
        Ok(json!({
            "success": "OAuth Token 生成成功，请保存以下 Token。",
            "oauth_token": pair.token,
            "oauth_token_secret": pair.secret,
            "instructions": "将 oauth_token 和 oauth_token_secret 保存为 FANFOU_OAUTH_TOKEN 和 FANFOU_OAUTH_TOKEN_SECRET（或对应的 X-Fanfou-OAuth-Token 请求头），然后移除用户名密码配置。",
        }))
    }

    async fn get_home_timeline(&self, args: &Map<String, Value>) -> Result<Value, FanfouError> {
        let count = arg_count(args)?;
        let max_id = arg_optional_string(args, "max_id")?;
        let session = self.session().await?;
        let raw = session.api().home_timeline(count, max_id.as_deref()).await?;
        Ok(shape_timeline(raw))
    }

    async fn get_user_timeline(&self, args: &Map<String, Value>) -> Result<Value, FanfouError> {
        let user_id = arg_optional_string(args, "user_id")?;
        let max_id = arg_optional_string(args, "max_id")?;
        let count = arg_count(args)?;
        let query = arg_optional_string(args, "q")?;
        let session = self.session().await?;
        let user_id = session.resolve_user_id(user_id.as_deref()).await?;
        let raw = session
            .api()
            .user_timeline(&user_id, count, max_id.as_deref(), query.as_deref())
            .await?;
        Ok(shape_timeline(raw))
    }

    async fn get_public_timeline(&self, args: &Map<String, Value>) -> Result<Value, FanfouError> {
        let count = arg_count(args)?;
        let max_id = arg_optional_string(args, "max_id")?;
        let query = arg_optional_string(args, "q")?;
        let session = self.session().await?;
        let raw = session
            .api()
            .public_timeline(count, max_id.as_deref(), query.as_deref())
            .await?;
        Ok(shape_timeline(raw))
    }

    async fn get_user_info(&self, args: &Map<String, Value>) -> Result<Value, FanfouError> {
        let user_id = arg_optional_string(args, "user_id")?;
        let session = self.session().await?;
        let user_id = session.resolve_user_id(user_id.as_deref()).await?;
        let raw = session.api().user_show(&user_id).await?;
        Ok(shape::user_profile(&raw))
    }

    async fn get_status_info(&self, args: &Map<String, Value>) -> Result<Value, FanfouError> {
        let status_id = required_string(args, "status_id")?;
        let include_image = arg_bool(args, "include_image", true)?;
        let session = self.session().await?;
        let raw = session.api().status_show(&status_id).await?;

        let inline_image = match shape::photo_urls(&raw) {
            Some((large, normal)) if include_image => {
                image::inline_data_url(&self.http, &large, &normal).await
            }
            _ => None,
        };
        Ok(shape::status_detail(&raw, inline_image))
    }

    async fn manage_favorite(&self, args: &Map<String, Value>) -> Result<Value, FanfouError> {
        let status_id = required_string(args, "status_id")?;
        let action = MutationAction::parse(&required_string(args, "action")?)?;
        let operation = match action {
            MutationAction::Create => "收藏",
            MutationAction::Destroy => "取消收藏",
        };
        require_confirmation(
            args,
            operation,
            json!({ labels::TARGET_STATUS_ID: status_id }),
        )?;

        let session = self.session().await?;
        let raw = session.api().favorite(action, &status_id).await?;
        Ok(shape::favorite_result(&status_id, action, &raw))
    }

    async fn manage_friendship(&self, args: &Map<String, Value>) -> Result<Value, FanfouError> {
        let user_id = required_string(args, "user_id")?;
        let action = MutationAction::parse(&required_string(args, "action")?)?;
        let operation = match action {
            MutationAction::Create => "关注",
            MutationAction::Destroy => "取消关注",
        };
        require_confirmation(args, operation, json!({ labels::USER_ID: user_id }))?;

        let session = self.session().await?;
        let target_protected = match action {
            MutationAction::Create => shape::is_protected(&session.api().user_show(&user_id).await?),
            MutationAction::Destroy => false,
        };
        let raw = session.api().friendship(action, &user_id).await?;
        Ok(shape::friendship_result(&user_id, action, target_protected, &raw))
    }

    async fn publish_status(&self, args: &Map<String, Value>) -> Result<Value, FanfouError> {
        let status = required_string(args, "status")?;
        require_confirmation(args, "发布文字内容", json!({ labels::CONTENT: status }))?;

        let session = self.session().await?;
        let raw = session.api().update_status(&status).await?;
        Ok(shape::publish_result(&raw, false))
    }

    async fn publish_photo(&self, args: &Map<String, Value>) -> Result<Value, FanfouError> {
        let status = required_string(args, "status")?;
        let photo_url = required_string(args, "photo_url")?;
        require_confirmation(
            args,
            "发布图片内容",
            json!({ labels::CONTENT: status, labels::IMAGE_URL: photo_url }),
        )?;

        let session = self.session().await?;
        let photo = image::download(&self.http, &photo_url)
            .await
            .map_err(|e| FanfouError::request_failed("photo download", e))?;
        let raw = session
            .api()
            .upload_photo(&status, photo.bytes, &photo.content_type)
            .await?;
        Ok(shape::publish_result(&raw, true))
    }

    async fn delete_status(&self, args: &Map<String, Value>) -> Result<Value, FanfouError> {
        let status_id = required_string(args, "status_id")?;
        require_confirmation(
            args,
            "删除内容",
            json!({ labels::TARGET_STATUS_ID: status_id }),
        )?;

        let session = self.session().await?;
        let raw = session.api().destroy_status(&status_id).await?;
        Ok(shape::delete_result(&status_id, &raw))
    }
}

fn shape_timeline(raw: Value) -> Value {
    match raw {
        Value::Array(items) => Value::Array(shape::timeline(&items)),
        other => other,
    }
}

fn require_confirmation(
    args: &Map<String, Value>,
    operation: &str,
    preview: Value,
) -> Result<(), FanfouError> {
    if arg_bool(args, "confirm", false)? {
        return Ok(());
    }
    Err(FanfouError::ConfirmationRequired {
        prompt: shape::confirmation_request(operation, preview),
    })
}

fn arg_bool(args: &Map<String, Value>, key: &str, default: bool) -> Result<bool, FanfouError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(v)) => Ok(*v),
        Some(_) => Err(FanfouError::invalid_argument(key, "must be a boolean")),
    }
}

fn required_string(args: &Map<String, Value>, key: &str) -> Result<String, FanfouError> {
    match args.get(key) {
        None | Some(Value::Null) => Err(FanfouError::invalid_argument(key, "is required")),
        Some(Value::String(v)) if v.trim().is_empty() => {
            Err(FanfouError::invalid_argument(key, "must not be empty"))
        }
        Some(Value::String(v)) => Ok(v.trim().to_string()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(_) => Err(FanfouError::invalid_argument(key, "must be a string")),
    }
}

fn arg_optional_string(args: &Map<String, Value>, key: &str) -> Result<Option<String>, FanfouError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(v)) if v.trim().is_empty() => Ok(None),
        Some(Value::String(v)) => Ok(Some(v.trim().to_string())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(_) => Err(FanfouError::invalid_argument(key, "must be a string")),
    }
}

/// The remote service caps the count itself; only the type is checked here.
/// Type check only; the remote service applies its own range.
fn arg_count(args: &Map<String, Value>) -> Result<i64, FanfouError> {
    let not_integer = || FanfouError::invalid_argument("count", "must be an integer");
    match args.get("count") {
        None | Some(Value::Null) => Ok(DEFAULT_COUNT),
        Some(Value::Number(n)) => n.as_i64().ok_or_else(not_integer),
        Some(Value::String(s)) => s.trim().parse::<i64>().map_err(|_| not_integer()),
        Some(_) => Err(not_integer()),
    }
}
