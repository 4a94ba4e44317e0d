//! 书籍ID分配
//!
//! ID是随机字节的十六进制表示。先尝试8字节的短ID，
//! 连续冲突后改用16字节的长ID。

use uuid::Uuid;

use crate::error::{ReadpubError, Result};

/// 默认的最大尝试次数
pub const DEFAULT_ATTEMPTS: usize = 20;
/// 短ID的字节数
pub const SHORT_ID_BYTES: usize = 8;
/// 长ID的字节数
pub const LONG_ID_BYTES: usize = 16;

/// 前 `attempts - attempts / 2` 次使用短ID
pub fn widen_at(attempts: usize) -> usize {
    attempts - attempts / 2
}

/// 生成 `n_bytes` 个随机字节的十六进制字符串
///
/// 随机字节取自v4 UUID，跳过其中固定的版本位和变体位所在的字节。
pub fn random_token(n_bytes: usize) -> String {
    let mut bytes = Vec::with_capacity(n_bytes);
    while bytes.len() < n_bytes {
        let uuid = Uuid::new_v4();
        let random = uuid
            .as_bytes()
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != 6 && *index != 8)
            .map(|(_, byte)| *byte);
        bytes.extend(random.take(n_bytes - bytes.len()));
    }
    hex::encode(bytes)
}

/// 分配一个不与已有ID冲突的新ID
///
/// # 参数
/// * `is_taken` - 判断ID是否已被占用
/// * `attempts` - 最大尝试次数
/// * `widen_at` - 从第几次尝试开始使用长ID
pub fn allocate_id<F>(is_taken: F, attempts: usize, widen_at: usize) -> Result<String>
where
    F: Fn(&str) -> bool,
{
    allocate_id_with(is_taken, attempts, widen_at, random_token)
}

/// 同 [`allocate_id`]，但由调用者提供随机串生成函数
pub fn allocate_id_with<F, G>(is_taken: F, attempts: usize, widen_at: usize, mut token: G) -> Result<String>
where
    F: Fn(&str) -> bool,
    G: FnMut(usize) -> String,
{
    for attempt in 0..attempts {
        let n_bytes = if attempt < widen_at {
            SHORT_ID_BYTES
        } else {
            LONG_ID_BYTES
        };
        let id = token(n_bytes);
        if !is_taken(&id) {
            return Ok(id);
        }
    }
    Err(ReadpubError::IdExhausted(attempts))
}
