use crate::data::DataClient;
use crate::errors::{Error, Result};
use crate::models::Player;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;

/// All registered players, loaded at startup. Tokens never leave this
/// process except as bearer headers on gateway requests.
#[derive(Default)]
pub struct PlayerRegistry {
    by_id: DashMap<i64, Arc<Player>>,
    by_symbol: DashMap<String, i64>,
}

impl PlayerRegistry {
    pub fn new() -> PlayerRegistry {
        PlayerRegistry::default()
    }

    pub async fn load(db: &DataClient) -> Result<PlayerRegistry> {
        let registry = PlayerRegistry::new();
        for player in db.load_players().await? {
            registry.insert(player);
        }
        info!("Loaded {} players", registry.by_id.len());
        Ok(registry)
    }

    pub fn insert(&self, player: Player) {
        self.by_symbol.insert(player.agent_symbol.clone(), player.id);
        self.by_id.insert(player.id, Arc::new(player));
    }

    pub fn get(&self, player_id: i64) -> Result<Arc<Player>> {
        self.by_id
            .get(&player_id)
            .map(|p| p.value().clone())
            .ok_or_else(|| Error::PlayerNotFound(player_id.to_string()))
    }

    pub fn get_by_symbol(&self, agent_symbol: &str) -> Result<Arc<Player>> {
        let id = self
            .by_symbol
            .get(agent_symbol)
            .map(|id| *id.value())
            .ok_or_else(|| Error::PlayerNotFound(agent_symbol.to_string()))?;
        self.get(id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Utc;

    fn player(id: i64, symbol: &str) -> Player {
        Player {
            id,
            agent_symbol: symbol.to_string(),
            token: "token".to_string(),
            metadata: serde_json::json!({}),
            credits: 0,
            last_active: Utc::now(),
        }
    }

    #[test]
    fn test_lookup_by_id_and_symbol() {
        let registry = PlayerRegistry::new();
        registry.insert(player(1, "AGENT_ONE"));
        registry.insert(player(2, "AGENT_TWO"));
        assert_eq!(registry.get(1).unwrap().agent_symbol, "AGENT_ONE");
        assert_eq!(registry.get_by_symbol("AGENT_TWO").unwrap().id, 2);
        assert_eq!(
            registry.get_by_symbol("MISSING").unwrap_err().code(),
            "PlayerNotFound"
        );
    }
}
