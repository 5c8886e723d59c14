diesel::table! {
    players (id) {
        id -> Int8,
        agent_symbol -> Text,
        token -> Text,
        metadata -> Json,
        credits -> Int8,
        last_active -> Timestamptz,
    }
}

diesel::table! {
    waypoints (system_symbol, symbol) {
        system_symbol -> Text,
        symbol -> Text,
        details -> Json,
        synced_at -> Timestamptz,
    }
}

diesel::table! {
    system_graphs (system_symbol) {
        system_symbol -> Text,
        waypoints -> Json,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    market_snapshots (player_id, waypoint_symbol, captured_at) {
        player_id -> Int8,
        waypoint_symbol -> Text,
        captured_at -> Timestamptz,
        trade_goods -> Json,
    }
}

diesel::table! {
    contracts (player_id, contract_id) {
        player_id -> Int8,
        contract_id -> Text,
        details -> Json,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    ledger_entries (id) {
        id -> Int8,
        player_id -> Int8,
        kind -> Text,
        signed_amount -> Int8,
        units -> Int8,
        related_container_id -> Nullable<Uuid>,
        timestamp -> Timestamptz,
    }
}

diesel::table! {
    containers (id) {
        id -> Uuid,
        player_id -> Int8,
        kind -> Text,
        ship_symbol -> Nullable<Text>,
        config -> Json,
        status -> Text,
        current_iteration -> Int8,
        max_iterations -> Int8,
        last_error -> Nullable<Text>,
        restart_count -> Int4,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    container_logs (id) {
        id -> Int8,
        container_id -> Uuid,
        message -> Text,
        logged_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(containers, container_logs);
