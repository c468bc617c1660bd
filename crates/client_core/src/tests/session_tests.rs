use super::*;
use serde_json::{json, Value};
use shared::{domain::BOARD_CELLS, protocol::GameSnapshot};

fn game_id() -> GameId {
    "0190b1c4-6b7e-7c3a-9d2f-1a2b3c4d5e6f".parse().expect("uuid")
}

fn update_frame(cells: &[(usize, &str)], turn: &str) -> String {
    let mut board = vec![Value::Null; BOARD_CELLS];
    for (index, piece) in cells {
        board[*index] = json!(piece);
    }
    json!({ "op": 4, "d": { "game": { "board": board, "turn": turn } } }).to_string()
}

fn joined_session() -> SessionState {
    let mut state = SessionState::new().with_game_id(game_id());
    state
        .handle_frame(r#"{"op":2,"d":{"token":"abc"}}"#, &ReducerSettings::default())
        .expect("ready");
    state
}

#[test]
fn end_to_end_ready_update_preview_update() {
    let settings = ReducerSettings::default();
    let mut state = SessionState::new().with_game_id(game_id());

    let effects = state
        .handle_frame(r#"{"op":2,"d":{"token":"abc"}}"#, &settings)
        .expect("ready");
    assert_eq!(state.token().map(SessionToken::as_str), Some("abc"));
    assert_eq!(
        effects,
        vec![Effect::Send(ClientCommand::Join { id: game_id() })]
    );

    let effects = state
        .handle_frame(&update_frame(&[(0, "Black")], "White"), &settings)
        .expect("update");
    assert!(effects.is_empty());
    assert_eq!(state.board().get(0, 0), Some(Piece::Black));
    assert_eq!(state.board().count(Piece::Black), 1);
    assert_eq!(state.board().count(Piece::White), 0);
    assert_eq!(state.turn(), Piece::White);
    assert_eq!(state.preview(), None);

    state
        .handle_frame(r#"{"op":5,"d":{"changed":[[2,3]]}}"#, &settings)
        .expect("preview");
    assert_eq!(state.preview(), Some(&[Coord { x: 2, y: 3 }][..]));

    state
        .handle_frame(&update_frame(&[(0, "Black"), (1, "White")], "Black"), &settings)
        .expect("second update");
    assert_eq!(state.preview(), None);
}

#[test]
fn ready_without_game_id_defers_join() {
    let mut state = SessionState::new();
    let effects = state.apply(
        &ServerEvent::Ready {
            token: Some(SessionToken::new("abc")),
        },
        &ReducerSettings::default(),
    );
    assert!(effects.is_empty());
    assert!(state.is_ready());
    assert_eq!(state.token().map(SessionToken::as_str), Some("abc"));
}

#[test]
fn second_ready_keeps_token_and_emits_nothing() {
    let mut state = joined_session();
    let effects = state.apply(
        &ServerEvent::Ready {
            token: Some(SessionToken::new("other")),
        },
        &ReducerSettings::default(),
    );
    assert!(effects.is_empty());
    assert_eq!(state.token().map(SessionToken::as_str), Some("abc"));
}

#[test]
fn injected_token_survives_ready() {
    let mut state = SessionState::new()
        .with_game_id(game_id())
        .with_token(SessionToken::new("cookie"));
    let effects = state.apply(
        &ServerEvent::Ready {
            token: Some(SessionToken::new("issued")),
        },
        &ReducerSettings::default(),
    );
    assert_eq!(state.token().map(SessionToken::as_str), Some("cookie"));
    assert_eq!(effects.len(), 1);
}

#[test]
fn legacy_game_create_stores_id_and_joins() {
    let settings = ReducerSettings {
        protocol: ProtocolVersion::Legacy,
        ..ReducerSettings::default()
    };
    let mut state = SessionState::new();
    let frame = json!({ "op": 3, "d": { "id": game_id().to_string() } }).to_string();
    let effects = state.handle_frame(&frame, &settings).expect("create");
    assert_eq!(state.game_id(), Some(game_id()));
    assert_eq!(
        effects,
        vec![Effect::Send(ClientCommand::Join { id: game_id() })]
    );
}

#[test]
fn null_cells_clear_previous_pieces() {
    let settings = ReducerSettings::default();
    let mut state = joined_session();
    state
        .handle_frame(&update_frame(&[(27, "White"), (28, "Black")], "Black"), &settings)
        .expect("first");
    state
        .handle_frame(&update_frame(&[(28, "Black")], "White"), &settings)
        .expect("second");
    assert_eq!(state.board().get(3, 3), None);
    assert_eq!(state.board().get(4, 3), Some(Piece::Black));
}

#[test]
fn preview_boundary_cells() {
    let settings = ReducerSettings::default();
    let mut state = joined_session();
    state
        .handle_frame(r#"{"op":5,"d":{"changed":[[0,0],[7,7]]}}"#, &settings)
        .expect("preview");
    assert!(state.is_previewed(Coord::new(0, 0).unwrap()));
    assert!(state.is_previewed(Coord::new(7, 7).unwrap()));
    assert!(!state.is_previewed(Coord::new(7, 0).unwrap()));
    assert!(!state.is_previewed(Coord::new(0, 7).unwrap()));
}

#[test]
fn preview_is_keyed_by_column_then_row() {
    let settings = ReducerSettings::default();
    let mut state = joined_session();
    state
        .handle_frame(r#"{"op":5,"d":{"changed":[[6,1]]}}"#, &settings)
        .expect("preview");
    // column 6, row 1
    assert!(state.is_previewed(Coord { x: 6, y: 1 }));
    assert!(!state.is_previewed(Coord { x: 1, y: 6 }));
}

#[test]
fn clear_preview_on_pointer_leave() {
    let mut state = joined_session();
    state.apply(
        &ServerEvent::Preview {
            changed: vec![Coord::new(1, 1).unwrap()],
        },
        &ReducerSettings::default(),
    );
    state.clear_preview();
    assert_eq!(state.preview(), None);
}

#[test]
fn error_frame_is_reported_without_mutation() {
    let mut state = joined_session();
    let before = state.clone();
    let effects = state
        .handle_frame(
            r#"{"op":6,"d":{"message":"not your turn","code":400}}"#,
            &ReducerSettings::default(),
        )
        .expect("error frame");
    assert_eq!(state, before);
    assert_eq!(
        effects,
        vec![Effect::ReportError(ProtocolError::new(400, "not your turn"))]
    );
}

#[test]
fn unknown_op_leaves_state_untouched() {
    let mut state = joined_session();
    state.set_color(Piece::White);
    let before = state.clone();
    let err = state
        .handle_frame(r#"{"op":99,"d":{}}"#, &ReducerSettings::default())
        .expect_err("unknown op");
    assert!(matches!(err, DecodeError::UnknownOpcode { op: 99, .. }));
    assert_eq!(state, before);
}

#[test]
fn abort_schedules_one_redirect_with_configured_delay() {
    let settings = ReducerSettings {
        abort_redirect_delay: Duration::from_secs(3),
        ..ReducerSettings::default()
    };
    let mut state = joined_session();
    let abort = ServerEvent::GameAbort {
        token: None,
        id: Some(game_id().to_string()),
    };

    let first = state.apply(&abort, &settings);
    assert_eq!(
        first,
        vec![Effect::ScheduleRedirect {
            delay: Duration::from_secs(3)
        }]
    );
    assert!(state.is_over());

    let second = state.apply(&abort, &settings);
    assert!(second.is_empty());
    assert!(matches!(state.game_over(), Some(GameOver::Aborted { .. })));
}

#[test]
fn abort_token_from_opponent_never_replaces_ours() {
    let mut state = joined_session();
    let effects = state
        .handle_frame(
            &json!({ "op": 3, "d": { "token": "opponent", "id": game_id().to_string() } })
                .to_string(),
            &ReducerSettings::default(),
        )
        .expect("abort");
    assert_eq!(effects.len(), 1);
    assert_eq!(state.token(), Some(&SessionToken::new("abc")));
    assert!(state.is_over());
}

#[test]
fn game_end_announces_result_once() {
    let settings = ReducerSettings::default();
    let mut state = joined_session();
    let result = GameResult {
        winner: "White".into(),
        points: 35,
        total: 64,
    };

    let effects = state.apply(&ServerEvent::GameEnd(result.clone()), &settings);
    assert_eq!(effects, vec![Effect::AnnounceResult(result.clone())]);

    let effects = state.apply(&ServerEvent::GameEnd(result.clone()), &settings);
    assert!(effects.is_empty());
    assert_eq!(state.game_over(), Some(&GameOver::Completed(result)));
}

#[test]
fn game_end_redirects_when_configured() {
    let settings = ReducerSettings {
        end_redirect_delay: Some(Duration::from_secs(10)),
        ..ReducerSettings::default()
    };
    let mut state = joined_session();
    let effects = state.apply(
        &ServerEvent::GameEnd(GameResult {
            winner: "Black".into(),
            points: 33,
            total: 64,
        }),
        &settings,
    );
    assert!(effects.contains(&Effect::ScheduleRedirect {
        delay: Duration::from_secs(10)
    }));
}

#[test]
fn abort_after_end_keeps_completed_outcome() {
    let settings = ReducerSettings::default();
    let mut state = joined_session();
    let result = GameResult {
        winner: "Black".into(),
        points: 40,
        total: 64,
    };
    state.apply(&ServerEvent::GameEnd(result.clone()), &settings);
    let effects = state.apply(
        &ServerEvent::GameAbort {
            token: None,
            id: None,
        },
        &settings,
    );
    assert!(effects.is_empty());
    assert_eq!(state.game_over(), Some(&GameOver::Completed(result)));
}

#[test]
fn updates_after_game_over_still_apply_but_flag_stays() {
    let settings = ReducerSettings::default();
    let mut state = joined_session();
    state.apply(
        &ServerEvent::GameAbort {
            token: None,
            id: None,
        },
        &settings,
    );
    let mut board = Board::empty();
    board[Coord::new(7, 7).unwrap()] = Some(Piece::White);
    state.apply(
        &ServerEvent::GameUpdate(GameSnapshot {
            board: board.clone(),
            turn: Piece::Black,
        }),
        &settings,
    );
    assert_eq!(state.board(), &board);
    assert!(state.is_over());
}

#[test]
fn place_uses_color_game_id_and_current_token() {
    let mut state = joined_session();
    assert!(matches!(
        state.place(2, 3),
        Err(ClientError::MissingContext {
            missing: "colour",
            ..
        })
    ));

    state.set_color(Piece::Black);
    let command = state.place(2, 3).expect("place");
    assert_eq!(
        command,
        ClientCommand::Place {
            id: game_id(),
            at: Coord { x: 2, y: 3 },
            piece: Piece::Black,
        }
    );
    let envelope = state.envelope(command).expect("envelope");
    assert_eq!(envelope.t.as_str(), "abc");
    assert_eq!(envelope.op, ClientCommand::OP_PLACE);
}

#[test]
fn hover_rejects_off_board_coordinates() {
    let mut state = joined_session();
    state.set_color(Piece::White);
    assert!(matches!(
        state.hover(8, 0),
        Err(ClientError::OffBoard { x: 8, y: 0 })
    ));
    assert!(matches!(
        state.hover(7, 7),
        Ok(ClientCommand::PreviewPlace { .. })
    ));
}

#[test]
fn envelope_requires_a_token() {
    let state = SessionState::new().with_game_id(game_id());
    let err = state.envelope(state.identify()).expect_err("no token");
    assert!(matches!(
        err,
        ClientError::MissingContext {
            command: "identify",
            missing: "token"
        }
    ));
}

#[test]
fn is_my_turn_follows_turn_and_color() {
    let settings = ReducerSettings::default();
    let mut state = joined_session();
    assert!(!state.is_my_turn());
    state.set_color(Piece::White);
    state
        .handle_frame(&update_frame(&[], "White"), &settings)
        .expect("update");
    assert!(state.is_my_turn());
}

#[test]
fn reduce_is_the_by_value_form_of_apply() {
    let state = SessionState::new().with_game_id(game_id());
    let (next, effects) = reduce(
        state,
        &ServerEvent::Ready {
            token: Some(SessionToken::new("abc")),
        },
        &ReducerSettings::default(),
    );
    assert!(next.is_ready());
    assert_eq!(effects.len(), 1);
}
