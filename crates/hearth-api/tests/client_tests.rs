// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use hearth_api::{Client, error_status};
use hearth_app::{
    DataSource, GoalCriteria, GoalId, GoalStatus, HitKind, MemberId, MemberRole, SearchHit,
};
use hearth_testkit::{FamilyFaker, reference_now};
use std::io::Read;
use std::thread;
use std::time::Duration;
use tiny_http::{Header, Method, Response, Server};

fn json_response(body: String, status: u16) -> Response<std::io::Cursor<Vec<u8>>> {
    Response::from_string(body)
        .with_status_code(status)
        .with_header(
            Header::from_bytes("Content-Type", "application/json")
                .expect("valid content type header"),
        )
}

fn mock_server() -> Result<(Server, String)> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}/api", server.server_addr());
    Ok((server, addr))
}

#[test]
fn unreachable_server_reports_transport_failure() {
    let client = Client::new("http://127.0.0.1:1", Duration::from_millis(50))
        .expect("client should initialize");

    let error = client
        .list_members()
        .expect_err("listing should fail for unreachable endpoint");
    assert!(error.to_string().contains("cannot reach"));
    assert_eq!(error_status(&error), None);
}

#[test]
fn list_goals_sends_criteria_as_query_pairs() -> Result<()> {
    let (server, addr) = mock_server()?;
    let goal = FamilyFaker::new(4).goal_record(7);
    let body = serde_json::to_string(&vec![goal.clone()])?;

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        assert_eq!(request.method(), &Method::Get);
        assert_eq!(request.url(), "/api/goals?q=beach+trip&status=active");
        request
            .respond(json_response(body, 200))
            .expect("response should succeed");
    });

    let client = Client::new(&addr, Duration::from_secs(1))?;
    let criteria = GoalCriteria::default()
        .with_query("beach trip")
        .with_status(GoalStatus::Active);
    let goals = client.list_goals(&criteria)?;
    assert_eq!(goals, vec![goal]);

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn server_errors_keep_their_status() -> Result<()> {
    let (server, addr) = mock_server()?;

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        request
            .respond(json_response(
                r#"{"error":{"message":"database unavailable"}}"#.to_owned(),
                503,
            ))
            .expect("response should succeed");
    });

    let client = Client::new(&addr, Duration::from_secs(1))?;
    let error = client
        .get_goal(GoalId::new(3))
        .expect_err("503 should surface as an error");
    assert_eq!(error_status(&error), Some(503));
    assert_eq!(error.to_string(), "server error (503): database unavailable");

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn create_goal_posts_input_and_author() -> Result<()> {
    let (server, addr) = mock_server()?;
    let mut faker = FamilyFaker::new(8);
    let input = faker.goal();
    let created = faker.goal_record(11);
    let body = serde_json::to_string(&created)?;
    let expected_title = input.title.clone();

    let handle = thread::spawn(move || {
        let mut request = server.recv().expect("request expected");
        assert_eq!(request.method(), &Method::Post);
        assert_eq!(request.url(), "/api/goals");
        let mut payload = String::new();
        request
            .as_reader()
            .read_to_string(&mut payload)
            .expect("body should be readable");
        let value: serde_json::Value = serde_json::from_str(&payload).expect("json body");
        assert_eq!(value["goal"]["title"], expected_title.as_str());
        assert_eq!(value["author"], 5);
        request
            .respond(json_response(body, 201))
            .expect("response should succeed");
    });

    let client = Client::new(&addr, Duration::from_secs(1))?;
    let goal = client.create_goal(&input, Some(MemberId::new(5)))?;
    assert_eq!(goal.id, GoalId::new(11));

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn invalid_input_never_reaches_the_server() -> Result<()> {
    let client = Client::new("http://127.0.0.1:1", Duration::from_millis(50))?;
    let mut input = FamilyFaker::new(2).goal();
    input.title = "   ".to_owned();
    let error = client
        .create_goal(&input, None)
        .expect_err("blank title should be rejected locally");
    assert!(error.to_string().contains("title is required"));

    let mut invite = FamilyFaker::new(2).invite(MemberRole::Viewer);
    invite.role = MemberRole::Owner;
    assert!(client.invite_member(&invite).is_err());
    Ok(())
}

#[test]
fn search_encodes_query_and_limit() -> Result<()> {
    let (server, addr) = mock_server()?;
    let hit = SearchHit {
        kind: HitKind::Goal,
        id: 1,
        goal_id: Some(GoalId::new(1)),
        title: "Vacation fund".to_owned(),
        subtitle: "vacation goal, active".to_owned(),
        created_at: reference_now(),
    };
    let body = serde_json::to_string(&vec![hit.clone()])?;

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        assert_eq!(request.url(), "/api/search?q=vac+%26+co&limit=8");
        request
            .respond(json_response(body, 200))
            .expect("response should succeed");
    });

    let client = Client::new(&addr, Duration::from_secs(1))?;
    assert!(client.search("  ", 8)?.is_empty());
    let hits = client.search(" vac & co ", 8)?;
    assert_eq!(hits, vec![hit]);

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn delete_goal_accepts_empty_success() -> Result<()> {
    let (server, addr) = mock_server()?;

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        assert_eq!(request.method(), &Method::Delete);
        assert_eq!(request.url(), "/api/goals/9");
        request
            .respond(Response::empty(204))
            .expect("response should succeed");
    });

    let client = Client::new(&addr, Duration::from_secs(1))?;
    client.delete_goal(GoalId::new(9))?;

    handle.join().expect("server thread should join");
    Ok(())
}
