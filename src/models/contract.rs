use crate::models::WaypointSymbol;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub id: String,
    pub faction_symbol: String,
    #[serde(rename = "type")]
    pub contract_type: String,
    pub terms: Terms,
    pub accepted: bool,
    pub fulfilled: bool,
    pub expiration: DateTime<Utc>,
    pub deadline_to_accept: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Terms {
    pub deadline: String,
    pub payment: Payment,
    #[serde(default)]
    pub deliver: Vec<Deliver>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub on_fulfilled: i64,
    pub on_accepted: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deliver {
    pub trade_symbol: String,
    pub destination_symbol: WaypointSymbol,
    pub units_required: i64,
    pub units_fulfilled: i64,
}

impl Contract {
    pub fn outstanding_units(&self) -> i64 {
        self.terms
            .deliver
            .iter()
            .map(|d| d.units_required - d.units_fulfilled)
            .sum()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_contract_deserialize() {
        let json = r#"{
            "id": "cls7fi0q2",
            "factionSymbol": "CORSAIRS",
            "type": "PROCUREMENT",
            "terms": {
                "deadline": "2024-02-11T11:37:29.626Z",
                "payment": {"onAccepted": 1391, "onFulfilled": 10466},
                "deliver": [{
                    "tradeSymbol": "ALUMINUM_ORE",
                    "destinationSymbol": "X1-TZ26-H51",
                    "unitsRequired": 46,
                    "unitsFulfilled": 12
                }]
            },
            "accepted": false,
            "fulfilled": false,
            "expiration": "2024-02-05T11:37:29.626Z",
            "deadlineToAccept": "2024-02-05T11:37:29.626Z"
        }"#;
        let contract: Contract = serde_json::from_str(json).unwrap();
        assert_eq!(contract.outstanding_units(), 34);
        assert!(!contract.accepted);
    }
}
