//! Integration tests for the revolt-cli library.
//! The live test requires a session token in the environment to run.

#[cfg(test)]
mod tests {
    use revolt_cli::chat::{
        ChatCommand, Config, ConfigAction, ConfigStore, FriendsAction, parse_command,
    };
    use revolt_cli::types::{ClientFrame, Presence, ServerEvent};
    use revolt_cli::{ChatApi, RevoltClient};

    #[test]
    fn test_ready_frame_decodes() {
        let frame = r#"{
            "type": "Ready",
            "users": [{"_id": "01SELF", "username": "me", "online": true}],
            "servers": [{
                "_id": "01ALPHA",
                "owner": "01SELF",
                "name": "Alpha",
                "channels": ["01GENERAL"],
                "roles": {"01MOD": {"name": "Mod", "permissions": {"a": 64, "d": 0}, "rank": 1}}
            }],
            "channels": [
                {"channel_type": "TextChannel", "_id": "01GENERAL", "server": "01ALPHA", "name": "general"},
                {"channel_type": "DirectMessage", "_id": "01DM", "recipients": ["01SELF", "01BOB"], "active": true}
            ],
            "members": [{"_id": {"server": "01ALPHA", "user": "01SELF"}, "roles": ["01MOD"]}],
            "emojis": []
        }"#;
        let ServerEvent::Ready(snapshot) = ServerEvent::decode(frame).unwrap() else {
            panic!("expected a Ready event");
        };
        assert_eq!(snapshot.users.len(), 1);
        assert_eq!(snapshot.servers[0].roles["01MOD"].name, "Mod");
        assert_eq!(snapshot.channels.len(), 2);
        assert_eq!(snapshot.members[0].roles, vec!["01MOD".to_string()]);
    }

    #[test]
    fn test_message_frame_decodes() {
        let frame = r#"{"type":"Message","_id":"01HZX3ABC123","channel":"01GENERAL","author":"01BOB","content":"hello"}"#;
        let ServerEvent::Message(message) = ServerEvent::decode(frame).unwrap() else {
            panic!("expected a Message event");
        };
        assert_eq!(message.short_id(), "ABC123");
        assert_eq!(message.text(), "hello");
    }

    #[test]
    fn test_unhandled_frames_are_unknown() {
        for frame in [
            r#"{"type":"Pong","data":0}"#,
            r#"{"type":"ChannelAck","id":"01C","user":"01U","message_id":"01M"}"#,
        ] {
            assert_eq!(ServerEvent::decode(frame).unwrap(), ServerEvent::Unknown);
        }
    }

    #[test]
    fn test_outbound_frames() {
        let frame = ClientFrame::Authenticate {
            token: "abc".to_string(),
        };
        let value: serde_json::Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();
        assert_eq!(value["type"], "Authenticate");
        assert_eq!(value["token"], "abc");
    }

    #[test]
    fn test_config_round_trips_through_disk() {
        let path = std::env::temp_dir().join(format!(
            "revolt-cli-integration-{}.json",
            std::process::id()
        ));
        let store = ConfigStore::new(&path);
        assert_eq!(store.load(), Config::default());

        let config = Config {
            token: Some("tok".to_string()),
            last_server_id: Some("01ALPHA".to_string()),
            last_channel_id: Some("01GENERAL".to_string()),
            color: false,
            history_limit: 50,
        };
        store.save(&config).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"lastServerId\""));
        assert!(text.contains("\"historyLimit\""));
        assert_eq!(store.load(), config);

        store.clear_token().unwrap();
        let cleared = store.load();
        assert_eq!(cleared.token, None);
        assert_eq!(cleared.last_channel_id.as_deref(), Some("01GENERAL"));

        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(store.load(), Config::default());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_command_parsing() {
        assert_eq!(parse_command("hello"), None);
        assert_eq!(
            parse_command("/status busy in a meeting"),
            Some(ChatCommand::Status {
                presence: Presence::Busy,
                text: Some("in a meeting".to_string()),
            })
        );
        assert_eq!(
            parse_command("/config color off"),
            Some(ChatCommand::Config(ConfigAction::Color(false)))
        );
        assert_eq!(
            parse_command("/friends add Alice"),
            Some(ChatCommand::Friends(FriendsAction::Add("Alice".to_string())))
        );
        assert_eq!(
            parse_command("/timeout bob 10"),
            Some(ChatCommand::Timeout {
                user: "bob".to_string(),
                minutes: 10,
            })
        );
        assert!(matches!(
            parse_command("/timeout bob soon"),
            Some(ChatCommand::Invalid(_))
        ));
        assert_eq!(parse_command("/nope"), None);
    }

    #[tokio::test]
    async fn test_fetch_self_with_live_token() {
        // This test requires REVOLT_TOKEN to be set
        let token = match std::env::var("REVOLT_TOKEN") {
            Ok(token) => token,
            Err(_) => {
                eprintln!("Skipping test: REVOLT_TOKEN not set");
                return;
            }
        };

        let client = RevoltClient::new().expect("Failed to create client");
        let user = client.fetch_self(&token).await;
        assert!(user.is_ok(), "Request should succeed with a valid token");
    }
}
