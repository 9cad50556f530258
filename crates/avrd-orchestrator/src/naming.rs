//! Deterministic container naming.
//!
//! The orchestrator and the dial-plan renderer both derive container names
//! from the same scheme, so PBX entries and container identities cannot
//! drift apart: `avr-<role>-<agent id>` for provider containers and
//! `avr-core-<agent id>` for the core.

use avrd_types::{AgentMode, ContainerRole};

/// Name of the container fulfilling `role` for an agent.
pub fn container_name(agent_id: &str, role: ContainerRole) -> String {
    format!("avr-{}-{agent_id}", role.as_str())
}

/// Name of an agent's core container.
pub fn core_container(agent_id: &str) -> String {
    container_name(agent_id, ContainerRole::Core)
}

/// The complete container-name set an agent owns in a given mode, provider
/// containers first, core last. Stop paths walk this list; run paths start
/// containers in the same order.
pub fn expected_containers(agent_id: &str, mode: AgentMode) -> Vec<String> {
    let roles: &[ContainerRole] = match mode {
        AgentMode::Sts => &[ContainerRole::Sts, ContainerRole::Core],
        AgentMode::Pipeline => &[
            ContainerRole::Asr,
            ContainerRole::Llm,
            ContainerRole::Tts,
            ContainerRole::Core,
        ],
    };
    roles
        .iter()
        .map(|role| container_name(agent_id, *role))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_embed_role_and_agent() {
        assert_eq!(container_name("a1", ContainerRole::Asr), "avr-asr-a1");
        assert_eq!(core_container("a1"), "avr-core-a1");
    }

    #[test]
    fn pipeline_owns_four_containers() {
        assert_eq!(
            expected_containers("a1", AgentMode::Pipeline),
            vec!["avr-asr-a1", "avr-llm-a1", "avr-tts-a1", "avr-core-a1"]
        );
    }

    #[test]
    fn sts_owns_two_containers() {
        assert_eq!(
            expected_containers("a1", AgentMode::Sts),
            vec!["avr-sts-a1", "avr-core-a1"]
        );
    }
}
