//! End-to-end smoke test exercising the facade's default feature set: create
//! an agent, attach a kernel through it, run a startup script, and tear
//! everything down.

use std::sync::Arc;

use agent_runtime::kernel::{InMemoryKernelManager, KernelManager};
use agent_runtime::manager::{AgentConfig, AgentManager, AgentManagerOptions, KernelType};
use agent_runtime::model_registry::ModelSettings;

fn default_settings() -> ModelSettings {
    ModelSettings::new("gpt-4o", "https://api.openai.com", "sk-test", 0.2)
}

#[tokio::test]
async fn create_attach_and_destroy_round_trip() {
    let kernel_manager: Arc<dyn KernelManager> = Arc::new(InMemoryKernelManager::new());
    let manager = AgentManager::new(
        AgentManagerOptions::new(default_settings()),
        None,
        Some(kernel_manager),
    );

    let id = manager
        .create_agent(AgentConfig {
            id: "analyst".to_owned(),
            name: "Analyst".to_owned(),
            ..Default::default()
        })
        .await
        .unwrap();

    manager.attach_kernel_to_agent(&id, KernelType::Python).await.unwrap();
    let agent = manager.get_agent(&id).await.unwrap();
    assert!(agent.kernel().is_some());

    manager.destroy_agent(&id).await.unwrap();
    assert!(!manager.agent_exists(&id).await);
}

#[tokio::test]
async fn namespace_listing_strips_the_prefix() {
    let manager = AgentManager::new(AgentManagerOptions::new(default_settings()), None, None);

    manager
        .create_agent(AgentConfig {
            id: "a".to_owned(),
            namespace: Some("team-1".to_owned()),
            name: "A".to_owned(),
            ..Default::default()
        })
        .await
        .unwrap();

    let listed = manager.list_agents(Some("team-1")).await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, "a");
    assert_eq!(listed[0].namespace.as_deref(), Some("team-1"));
}
