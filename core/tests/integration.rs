//! Full session lifecycle against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives `Session` over real
//! HTTP using ureq, once per credential policy. Validates that request
//! building, credential capture and response parsing agree with the server.

use expense_core::{
    register, ApiError, ClientConfig, CredentialPolicy, DashboardError, ExpenseDraft, ExpenseId,
    HttpMethod, HttpRequest, HttpResponse, LoginForm, Session, SignOut, SignupForm, Transport,
};

/// Executes requests with ureq, returning 4xx/5xx as data.
#[derive(Debug)]
struct Ureq(ureq::Agent);

impl Ureq {
    fn new() -> Self {
        Self(
            ureq::Agent::config_builder()
                .http_status_as_error(false)
                .build()
                .new_agent(),
        )
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

impl Transport for Ureq {
    fn execute(&self, req: HttpRequest) -> Result<HttpResponse, ApiError> {
        let agent = &self.0;
        let body = req.body.unwrap_or_default();
        let result = match req.method {
            HttpMethod::Get => with_headers(agent.get(&req.path), &req.headers).call(),
            HttpMethod::Delete => with_headers(agent.delete(&req.path), &req.headers).call(),
            HttpMethod::Post => with_headers(agent.post(&req.path), &req.headers).send(body.as_bytes()),
            HttpMethod::Put => with_headers(agent.put(&req.path), &req.headers).send(body.as_bytes()),
        };
        let mut response = result.map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
            .collect();
        let body = response.body_mut().read_to_string().unwrap_or_default();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn start_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}/api/v1")
}

fn lifecycle(credential: CredentialPolicy) {
    // Step 1: start mock server on a random port.
    let config = ClientConfig {
        credential,
        ..ClientConfig::default()
    }
    .with_base_url(&start_server())
    .unwrap();
    let transport = Ureq::new();

    // Step 2: sign up, then sign in.
    let signup = SignupForm {
        fullname: "Asha Rao".to_string(),
        email: "asha@example.com".to_string(),
        password: "secret1".to_string(),
        confirm_password: "secret1".to_string(),
    };
    register(&config, &transport, &signup).unwrap();

    let wrong = LoginForm {
        email: "asha@example.com".to_string(),
        password: "wrong-password".to_string(),
    };
    let err = Session::sign_in(&config, &transport, &wrong).unwrap_err();
    assert_eq!(err.to_string(), "Incorrect email or password");

    let login = LoginForm {
        email: "asha@example.com".to_string(),
        password: "secret1".to_string(),
    };
    let mut session = Session::sign_in(&config, &transport, &login).unwrap();

    // Step 3: initialize, empty list.
    session.initialize().unwrap();
    assert_eq!(session.dashboard().user().unwrap().display_name(), "Asha Rao");
    assert!(session.dashboard().expenses().is_empty());

    // Step 4: create two expenses; the newest is at the head.
    session
        .create(ExpenseDraft::new("Groceries", "50.5", "Food"))
        .unwrap();
    session
        .create(ExpenseDraft::new("Snacks", "abc", "Food"))
        .unwrap();
    let expenses = session.dashboard().expenses();
    assert_eq!(expenses[0].description, "Snacks");
    assert_eq!(expenses[0].amount, 0.0);
    assert_eq!(expenses[1].description, "Groceries");
    let groceries = expenses[1].id.clone();
    let snacks = expenses[0].id.clone();

    // Step 5: a blank category never reaches the server.
    let err = session
        .create(ExpenseDraft::new("Refund", "5", " "))
        .unwrap_err();
    assert!(matches!(err, DashboardError::Validation(_)));
    assert_eq!(session.dashboard().expenses().len(), 2);

    session
        .create(ExpenseDraft::new("Refund", "5", "Misc"))
        .unwrap();
    let refund = session.dashboard().expenses()[0].id.clone();

    // Step 6: edit the groceries amount to a negative value.
    session.begin_edit(&groceries).unwrap();
    session.edit_draft_mut().unwrap().set("amount", "-20");
    session.commit_edit().unwrap();
    let order: Vec<ExpenseId> = session
        .dashboard()
        .expenses()
        .iter()
        .map(|e| e.id.clone())
        .collect();
    assert_eq!(order, vec![refund.clone(), snacks.clone(), groceries.clone()]);

    // Step 7: declined delete keeps the entry; confirmed delete removes it.
    let err = session.delete(&refund, |_| false).unwrap_err();
    assert_eq!(err, DashboardError::ConfirmationDeclined);
    session.delete(&refund, |_| true).unwrap();
    let summary = session.dashboard().summary();
    assert_eq!(summary.count, 2);
    assert_eq!(summary.formatted_total(), "20.00");

    // Step 8: a refresh agrees with the local view.
    session.initialize().unwrap();
    assert_eq!(session.dashboard().summary().formatted_total(), "20.00");

    // Step 9: deleting something the server does not have.
    let err = session
        .delete(&ExpenseId::new("missing"), |_| true)
        .unwrap_err();
    assert!(!err.is_session_lost());
    assert_eq!(session.dashboard().last_error(), Some("Expense not found"));
    assert_eq!(session.dashboard().expenses().len(), 2);

    // Step 10: keep a copy of the credentialed client, then log out.
    let stale = session.client().clone();
    assert!(matches!(session.end_session(), SignOut::SignedOut));

    // Step 11: the old credential is now rejected as session loss.
    let response = transport.execute(stale.build_list_expenses()).unwrap();
    let err = stale.parse_list_expenses(response).unwrap_err();
    assert!(err.is_session_lost(), "{err:?}");
}

#[test]
fn lifecycle_with_session_cookie() {
    lifecycle(CredentialPolicy::default());
}

#[test]
fn lifecycle_with_bearer_token() {
    lifecycle(CredentialPolicy::Bearer);
}
