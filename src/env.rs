//! 环境变量配置覆盖
//!
//! 类型安全的环境变量访问：每个变量一个访问器，集中定义名称、
//! 说明与解析规则。解析失败不会让调用方崩溃，由
//! [`crate::core::AntiTranslateOptions::from_env`] 记录告警后回退默认值。

use std::env;
use std::fmt;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar {
    type Value;

    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<Self::Value>;

    /// 读取变量；未设置时返回 `Ok(None)`
    fn get() -> EnvResult<Option<Self::Value>> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value).map(Some),
            Err(env::VarError::NotPresent) => Ok(None),
            Err(err) => Err(EnvError {
                variable: Self::NAME.to_string(),
                message: err.to_string(),
            }),
        }
    }
}

fn parse_bool(variable: &str, value: &str) -> EnvResult<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(EnvError {
            variable: variable.to_string(),
            message: format!("Invalid boolean '{}'. Use: true/false, 1/0, yes/no, on/off", value),
        }),
    }
}

/// 兜底评估间隔（毫秒）
pub struct CheckInterval;

impl EnvVar for CheckInterval {
    type Value = u64;

    const NAME: &'static str = "ANTI_TRANSLATE_CHECK_INTERVAL";
    const DESCRIPTION: &'static str = "Periodic heuristic check interval in milliseconds (> 0)";

    fn parse(value: &str) -> EnvResult<u64> {
        match value.parse::<u64>() {
            Ok(ms) if ms > 0 => Ok(ms),
            Ok(_) => Err(EnvError {
                variable: Self::NAME.to_string(),
                message: "Interval must be greater than zero".to_string(),
            }),
            Err(err) => Err(EnvError {
                variable: Self::NAME.to_string(),
                message: format!("Invalid integer '{}': {}", value, err),
            }),
        }
    }
}

/// 是否为初始化后插入的内容自动补快照
pub struct WatchDynamic;

impl EnvVar for WatchDynamic {
    type Value = bool;

    const NAME: &'static str = "ANTI_TRANSLATE_WATCH_DYNAMIC";
    const DESCRIPTION: &'static str = "Capture snapshots for dynamically inserted content";

    fn parse(value: &str) -> EnvResult<bool> {
        parse_bool(Self::NAME, value)
    }
}

/// 侦测到翻译时是否立即自动还原
pub struct AutoRevert;

impl EnvVar for AutoRevert {
    type Value = bool;

    const NAME: &'static str = "ANTI_TRANSLATE_AUTO_REVERT";
    const DESCRIPTION: &'static str = "Automatically revert as soon as translation is detected";

    fn parse(value: &str) -> EnvResult<bool> {
        parse_bool(Self::NAME, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_parsing() {
        assert_eq!(CheckInterval::parse("250").unwrap(), 250);
        assert!(CheckInterval::parse("0").is_err());
        assert!(CheckInterval::parse("fast").is_err());
        assert!(CheckInterval::parse("-5").is_err());
    }

    #[test]
    fn bool_parsing_accepts_common_spellings() {
        for truthy in ["1", "true", "YES", "on"] {
            assert!(WatchDynamic::parse(truthy).unwrap());
        }
        for falsy in ["0", "false", "No", "OFF"] {
            assert!(!AutoRevert::parse(falsy).unwrap());
        }
        assert!(WatchDynamic::parse("maybe").is_err());
    }

    #[test]
    fn unset_variable_is_none() {
        env::remove_var(CheckInterval::NAME);
        assert_eq!(CheckInterval::get().unwrap(), None);
    }

    #[test]
    fn set_variable_is_parsed() {
        env::set_var(AutoRevert::NAME, "true");
        assert_eq!(AutoRevert::get().unwrap(), Some(true));
        env::remove_var(AutoRevert::NAME);
    }
}
