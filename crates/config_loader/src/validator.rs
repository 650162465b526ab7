//! 配置验证
//!
//! 验证规则：
//! - 蓝图类型上声明的字段范围（`validator` derive）
//! - 所有监听/目标地址必须能解析为 socket 地址
//! - 目标地址不可重复
//! - 重试：initial_delay_ms <= max_delay_ms

use std::collections::HashSet;
use std::net::SocketAddr;

use contracts::{ContractError, ForwarderBlueprint};
use ::validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// 验证 ForwarderBlueprint
///
/// 返回遇到的第一个错误，否则返回 Ok(())。
pub fn validate(blueprint: &ForwarderBlueprint) -> Result<(), ContractError> {
    validate_ranges(blueprint)?;
    validate_listen_addrs(blueprint)?;
    validate_destinations(blueprint)?;
    validate_retry_delays(blueprint)?;
    Ok(())
}

/// 执行 derive 声明的范围/长度检查
fn validate_ranges(blueprint: &ForwarderBlueprint) -> Result<(), ContractError> {
    blueprint.validate().map_err(|errors| {
        let (field, message) = first_violation(&errors, "")
            .unwrap_or_else(|| ("blueprint".to_string(), errors.to_string()));
        ContractError::config_validation(field, message)
    })
}

/// 将嵌套的校验错误展开为点分字段路径
fn first_violation(errors: &ValidationErrors, prefix: &str) -> Option<(String, String)> {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };

        let found = match kind {
            ValidationErrorsKind::Field(list) => list.first().map(|err| {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("failed '{}' check", err.code));
                (path.clone(), message)
            }),
            ValidationErrorsKind::Struct(inner) => first_violation(inner, &path),
            ValidationErrorsKind::List(items) => items
                .iter()
                .find_map(|(idx, inner)| first_violation(inner, &format!("{path}[{idx}]"))),
        };

        if found.is_some() {
            return found;
        }
    }
    None
}

fn parse_addr(field: &str, raw: &str) -> Result<SocketAddr, ContractError> {
    raw.parse::<SocketAddr>().map_err(|e| {
        ContractError::config_validation(field, format!("invalid address '{raw}': {e}"))
    })
}

/// 监听地址必须是可绑定的 socket 地址
fn validate_listen_addrs(blueprint: &ForwarderBlueprint) -> Result<(), ContractError> {
    parse_addr("agent.listen_addr", &blueprint.agent.listen_addr)?;
    parse_addr("health.listen_addr", &blueprint.health.listen_addr)?;
    if let Some(ref tap) = blueprint.stream.tap_addr {
        parse_addr("stream.tap_addr", tap)?;
    }
    Ok(())
}

/// 目标地址必须可解析且唯一
fn validate_destinations(blueprint: &ForwarderBlueprint) -> Result<(), ContractError> {
    let addrs = blueprint.forwarder.destination_addrs()?;
    let mut seen = HashSet::new();
    for (idx, addr) in addrs.iter().enumerate() {
        if !seen.insert(addr) {
            return Err(ContractError::config_validation(
                format!("forwarder.destinations[{idx}]"),
                format!("duplicate destination {addr}"),
            ));
        }
    }
    Ok(())
}

fn validate_retry_delays(blueprint: &ForwarderBlueprint) -> Result<(), ContractError> {
    let retry = &blueprint.forwarder.retry;
    if retry.initial_delay_ms > retry.max_delay_ms {
        return Err(ContractError::config_validation(
            "forwarder.retry.initial_delay_ms / forwarder.retry.max_delay_ms",
            format!(
                "initial_delay_ms ({}) must be <= max_delay_ms ({})",
                retry.initial_delay_ms, retry.max_delay_ms
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        AgentConfig, ConfigVersion, ForwarderConfig, HealthConfig, RetryConfig, StreamConfig,
        TransportKind,
    };

    fn minimal_blueprint() -> ForwarderBlueprint {
        ForwarderBlueprint {
            version: ConfigVersion::V1,
            agent: AgentConfig::default(),
            forwarder: ForwarderConfig {
                name: "doppler".into(),
                transport: TransportKind::Udp,
                destinations: vec!["10.0.0.1:3457".into(), "10.0.0.2:3457".into()],
                retry: RetryConfig {
                    enabled: true,
                    ..RetryConfig::default()
                },
            },
            health: HealthConfig::default(),
            stream: StreamConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&minimal_blueprint()).is_ok());
    }

    #[test]
    fn test_empty_destinations_are_legal() {
        let mut bp = minimal_blueprint();
        bp.forwarder.destinations.clear();
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_duplicate_destination() {
        let mut bp = minimal_blueprint();
        bp.forwarder.destinations.push("10.0.0.1:3457".into());
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("duplicate destination"), "got: {err}");
    }

    #[test]
    fn test_bad_destination() {
        let mut bp = minimal_blueprint();
        bp.forwarder.destinations[1] = "doppler.internal".into();
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("forwarder.destinations[1]"), "got: {err}");
    }

    #[test]
    fn test_empty_name() {
        let mut bp = minimal_blueprint();
        bp.forwarder.name = String::new();
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("name"), "got: {err}");
    }

    #[test]
    fn test_zero_retry_attempts() {
        let mut bp = minimal_blueprint();
        bp.forwarder.retry.max_attempts = 0;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("max_attempts"), "got: {err}");
    }

    #[test]
    fn test_retry_delay_order() {
        let mut bp = minimal_blueprint();
        bp.forwarder.retry.initial_delay_ms = 5000;
        bp.forwarder.retry.max_delay_ms = 100;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("must be <= max_delay_ms"), "got: {err}");
    }

    #[test]
    fn test_bad_tap_addr() {
        let mut bp = minimal_blueprint();
        bp.stream.tap_addr = Some("localhost".into());
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("stream.tap_addr"), "got: {err}");
    }

    #[test]
    fn test_zero_queue_capacity() {
        let mut bp = minimal_blueprint();
        bp.stream.consumer_queue_capacity = 0;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("consumer_queue_capacity"), "got: {err}");
    }
}
