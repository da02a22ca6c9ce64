//! Presentation layer: maps raw FanFou JSON to the relabeled field sets the
//! tools return. Everything here is pure; network-derived extras (inline
//! image data, the protected flag of a follow target) are passed in.

use serde_json::{Map, Value, json};

use crate::error::FanfouError;

/// Large images above this declared size are swapped for the normal-size URL.
pub const LARGE_IMAGE_LIMIT_BYTES: u64 = 300 * 1024;

/// Output field names.
pub mod labels {
    pub const TEXT: &str = "饭否内容";
    pub const STATUS_ID: &str = "发布 ID";
    pub const CREATED_AT: &str = "发布时间";
    pub const AUTHOR: &str = "发布者";
    pub const AUTHOR_ID: &str = "发布者 ID";
    pub const IMAGE_URL: &str = "图片链接";
    pub const IMAGE_BASE64: &str = "图片base64";

    pub const FAVORITED: &str = "是否收藏";
    pub const IS_SELF: &str = "是否是自己";
    pub const LOCATION: &str = "发布位置";
    pub const REPLY: &str = "回复信息";
    pub const REPLY_STATUS_ID: &str = "回复的状态 ID";
    pub const REPLY_USER_ID: &str = "回复的用户 ID";
    pub const REPLY_SCREEN_NAME: &str = "回复的用户名";

    pub const USER_ID: &str = "用户 ID";
    pub const USER_NAME: &str = "用户名";
    pub const SCREEN_NAME: &str = "显示名";
    pub const USER_LOCATION: &str = "位置";
    pub const GENDER: &str = "性别";
    pub const BIRTHDAY: &str = "生日";
    pub const DESCRIPTION: &str = "个人描述";
    pub const AVATAR: &str = "头像链接";
    pub const HOMEPAGE: &str = "个人主页";
    pub const PROTECTED: &str = "是否加锁";
    pub const FOLLOWERS: &str = "粉丝数";
    pub const FRIENDS: &str = "关注数";
    pub const FAVOURITES: &str = "收藏数";
    pub const STATUSES: &str = "发布数";
    pub const PHOTOS: &str = "照片数";
    pub const FOLLOWING: &str = "是否关注";
    pub const REGISTERED_AT: &str = "注册时间";
    pub const LATEST_STATUS: &str = "最新状态";

    pub const OPERATION: &str = "操作";
    pub const TARGET_STATUS_ID: &str = "状态 ID";
    pub const OUTCOME: &str = "结果";
    pub const CONTENT: &str = "内容";
    pub const NOTE: &str = "特殊情况";
    pub const DELETED_AT: &str = "删除时间";
    pub const ORIGINAL_TEXT: &str = "原内容";

    pub const NEEDS_CONFIRMATION: &str = "需要确认";
    pub const PREVIEW: &str = "内容预览";
    pub const CONFIRM_HINT: &str = "确认提示";

    pub const SUCCEEDED: &str = "成功";
    pub const FAILED: &str = "失败";
    pub const FOLLOW_REQUEST_SENT: &str = "关注申请已发送";
}

/// Direction of a favorite/friendship mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationAction {
    Create,
    Destroy,
}

impl MutationAction {
    pub fn parse(raw: &str) -> Result<Self, FanfouError> {
        match raw.trim() {
            "create" => Ok(Self::Create),
            "destroy" => Ok(Self::Destroy),
            other => Err(FanfouError::invalid_argument(
                "action",
                format!("expected 'create' or 'destroy', got '{other}'"),
            )),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Destroy => "destroy",
        }
    }
}

/// FanFou mutation endpoints carry no explicit status: a response that echoes
/// back a non-empty `id` means the change was applied.
pub fn was_mutation_successful(raw: &Value) -> bool {
    match raw.get("id") {
        Some(Value::String(id)) => !id.is_empty(),
        Some(Value::Number(_)) => true,
        _ => false,
    }
}

/// True when the record carries a non-empty `photo` object.
pub fn has_photo(record: &Value) -> bool {
    record
        .get("photo")
        .and_then(Value::as_object)
        .is_some_and(|photo| !photo.is_empty())
}

/// `(large, normal)` image URLs of a record's photo, if any.
pub fn photo_urls(record: &Value) -> Option<(String, String)> {
    if !has_photo(record) {
        return None;
    }
    let photo = &record["photo"];
    let large = str_of(photo, "largeurl");
    let normal = str_of(photo, "imageurl");
    if large.is_empty() && normal.is_empty() {
        return None;
    }
    Some((large, normal))
}

/// Pick the URL to download for inline image data. Decided before any body
/// is fetched, from the HEAD request's declared content length.
pub fn choose_image_url<'a>(content_length: Option<u64>, large: &'a str, normal: &'a str) -> &'a str {
    match content_length {
        Some(size) if size > LARGE_IMAGE_LIMIT_BYTES && !normal.is_empty() => normal,
        _ => large,
    }
}

pub fn timeline(items: &[Value]) -> Vec<Value> {
    items.iter().map(timeline_item).collect()
}

pub fn timeline_item(item: &Value) -> Value {
    let mut out = Map::new();
    out.insert(labels::TEXT.into(), text_or_empty(item, "text"));
    out.insert(labels::STATUS_ID.into(), text_or_empty(item, "id"));
    out.insert(labels::CREATED_AT.into(), text_or_empty(item, "created_at"));
    out.insert(labels::AUTHOR.into(), text_or_empty(&item["user"], "name"));
    out.insert(labels::AUTHOR_ID.into(), text_or_empty(&item["user"], "id"));
    if has_photo(item) {
        out.insert(
            labels::IMAGE_URL.into(),
            text_or_empty(&item["photo"], "largeurl"),
        );
    }
    Value::Object(out)
}

pub fn status_detail(raw: &Value, inline_image: Option<String>) -> Value {
    let mut out = match timeline_item(raw) {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    out.insert(labels::FAVORITED.into(), flag(raw, "favorited"));
    out.insert(labels::IS_SELF.into(), flag(raw, "is_self"));
    out.insert(labels::LOCATION.into(), text_or_empty(raw, "location"));

    let reply_to = str_of(raw, "in_reply_to_status_id");
    if !reply_to.is_empty() {
        out.insert(
            labels::REPLY.into(),
            json!({
                labels::REPLY_STATUS_ID: reply_to,
                labels::REPLY_USER_ID: text_or_empty(raw, "in_reply_to_user_id"),
                labels::REPLY_SCREEN_NAME: text_or_empty(raw, "in_reply_to_screen_name"),
            }),
        );
    }
    if let Some(data_url) = inline_image {
        out.insert(labels::IMAGE_BASE64.into(), Value::String(data_url));
    }
    Value::Object(out)
}

pub fn user_profile(raw: &Value) -> Value {
    let mut out = Map::new();
    out.insert(labels::USER_ID.into(), text_or_empty(raw, "id"));
    out.insert(labels::USER_NAME.into(), text_or_empty(raw, "name"));
    out.insert(labels::SCREEN_NAME.into(), text_or_empty(raw, "screen_name"));
    out.insert(labels::USER_LOCATION.into(), text_or_empty(raw, "location"));
    out.insert(labels::GENDER.into(), text_or_empty(raw, "gender"));
    out.insert(labels::BIRTHDAY.into(), text_or_empty(raw, "birthday"));
    out.insert(labels::DESCRIPTION.into(), text_or_empty(raw, "description"));
    out.insert(
        labels::AVATAR.into(),
        text_or_empty(raw, "profile_image_url_large"),
    );
    out.insert(labels::HOMEPAGE.into(), text_or_empty(raw, "url"));
    out.insert(labels::PROTECTED.into(), flag(raw, "protected"));
    out.insert(labels::FOLLOWERS.into(), counter(raw, "followers_count"));
    out.insert(labels::FRIENDS.into(), counter(raw, "friends_count"));
    out.insert(labels::FAVOURITES.into(), counter(raw, "favourites_count"));
    out.insert(labels::STATUSES.into(), counter(raw, "statuses_count"));
    out.insert(labels::PHOTOS.into(), counter(raw, "photo_count"));
    out.insert(labels::FOLLOWING.into(), flag(raw, "following"));
    out.insert(labels::REGISTERED_AT.into(), text_or_empty(raw, "created_at"));

    if let Some(status) = raw.get("status").filter(|s| s.as_object().is_some_and(|m| !m.is_empty())) {
        out.insert(
            labels::LATEST_STATUS.into(),
            json!({
                labels::TEXT: text_or_empty(status, "text"),
                labels::STATUS_ID: text_or_empty(status, "id"),
                labels::CREATED_AT: text_or_empty(status, "created_at"),
            }),
        );
    }
    Value::Object(out)
}

/// Whether the profile requires approval before a follow takes effect.
pub fn is_protected(profile: &Value) -> bool {
    profile
        .get("protected")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

pub fn favorite_result(status_id: &str, action: MutationAction, raw: &Value) -> Value {
    let operation = match action {
        MutationAction::Create => "收藏",
        MutationAction::Destroy => "取消收藏",
    };
    json!({
        labels::OPERATION: operation,
        labels::TARGET_STATUS_ID: status_id,
        labels::OUTCOME: outcome(raw),
        labels::FAVORITED: flag(raw, "favorited"),
        labels::TEXT: text_or_empty(raw, "text"),
        labels::AUTHOR: text_or_empty(&raw["user"], "name"),
    })
}

/// `target_protected` comes from a profile lookup made before the follow
/// call; the friendship response alone cannot tell a pending request from an
/// established follow.
pub fn friendship_result(
    user_id: &str,
    action: MutationAction,
    target_protected: bool,
    raw: &Value,
) -> Value {
    let succeeded = was_mutation_successful(raw);
    let pending_request = action == MutationAction::Create && target_protected;

    let operation = match action {
        MutationAction::Create if pending_request => "申请关注",
        MutationAction::Create => "关注",
        MutationAction::Destroy => "取消关注",
    };
    let result = match (succeeded, pending_request) {
        (false, _) => labels::FAILED,
        (true, true) => labels::FOLLOW_REQUEST_SENT,
        (true, false) => labels::SUCCEEDED,
    };
    let following = if pending_request {
        Value::Bool(false)
    } else {
        flag(raw, "following")
    };

    let mut out = json!({
        labels::OPERATION: operation,
        labels::USER_ID: user_id,
        labels::OUTCOME: result,
        labels::FOLLOWING: following,
        labels::USER_NAME: text_or_empty(raw, "name"),
        labels::SCREEN_NAME: text_or_empty(raw, "screen_name"),
    });
    if pending_request && succeeded {
        out[labels::NOTE] = json!("该账号受保护，关注需要对方确认后生效");
    }
    out
}

pub fn publish_result(raw: &Value, with_photo: bool) -> Value {
    let operation = if with_photo {
        "发布图片内容"
    } else {
        "发布文字内容"
    };
    let mut out = json!({
        labels::OPERATION: operation,
        labels::OUTCOME: outcome(raw),
        labels::STATUS_ID: text_or_empty(raw, "id"),
        labels::CREATED_AT: text_or_empty(raw, "created_at"),
        labels::CONTENT: text_or_empty(raw, "text"),
    });
    if with_photo {
        out[labels::IMAGE_URL] = text_or_empty(&raw["photo"], "largeurl");
    }
    out
}

pub fn delete_result(status_id: &str, raw: &Value) -> Value {
    json!({
        labels::OPERATION: "删除内容",
        labels::TARGET_STATUS_ID: status_id,
        labels::OUTCOME: outcome(raw),
        labels::DELETED_AT: text_or_empty(raw, "created_at"),
        labels::ORIGINAL_TEXT: text_or_empty(raw, "text"),
    })
}

/// Prompt returned in place of a mutation that arrived without `confirm`.
pub fn confirmation_request(operation: &str, preview: Value) -> Value {
    json!({
        labels::NEEDS_CONFIRMATION: true,
        labels::OPERATION: operation,
        labels::PREVIEW: preview,
        labels::CONFIRM_HINT: "此操作需要确认才能执行：请先向用户展示内容预览并获得同意，然后将 confirm 设为 true 重新调用。",
    })
}

fn outcome(raw: &Value) -> &'static str {
    if was_mutation_successful(raw) {
        labels::SUCCEEDED
    } else {
        labels::FAILED
    }
}

fn text_or_empty(record: &Value, key: &str) -> Value {
    match record.get(key) {
        None | Some(Value::Null) => Value::String(String::new()),
        Some(value) => value.clone(),
    }
}

fn str_of(record: &Value, key: &str) -> String {
    match record.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn flag(record: &Value, key: &str) -> Value {
    Value::Bool(record.get(key).and_then(Value::as_bool).unwrap_or(false))
}

fn counter(record: &Value, key: &str) -> Value {
    match record.get(key) {
        Some(Value::Number(n)) => Value::Number(n.clone()),
        _ => json!(0),
    }
}
