//! MCP integration tests: validates line codec→router→dispatcher→response
//! round trips over an in-memory duplex stream, backed by an in-memory table
//! store instead of PostgreSQL.

use async_trait::async_trait;
use pgbridge::db::{ColumnInfo, Database, Row, TableInfo, TableRef};
use pgbridge::mcp::McpServer;
use pgbridge::tools::Dispatcher;
use pgbridge::types::ServerConfig;
use pgbridge::{Error, Result};
use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};

/// Single-schema store holding `users(id, name)`.
#[derive(Debug, Default)]
struct MemoryDatabase {
    users: Mutex<Vec<(i64, String)>>,
    round_trips: AtomicUsize,
}

impl MemoryDatabase {
    fn with_users(names: &[&str]) -> Self {
        let users = names
            .iter()
            .enumerate()
            .map(|(i, n)| (i as i64 + 1, n.to_string()))
            .collect();
        Self {
            users: Mutex::new(users),
            round_trips: AtomicUsize::new(0),
        }
    }

    fn touch(&self) {
        self.round_trips.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn list_tables(&self) -> Result<Vec<TableInfo>> {
        self.touch();
        Ok(vec![TableInfo {
            name: "users".to_string(),
            schema: "public".to_string(),
        }])
    }

    async fn describe_table(&self, table: &TableRef) -> Result<Vec<ColumnInfo>> {
        self.touch();
        if table.name != "users" {
            return Ok(vec![]);
        }
        Ok(vec![
            ColumnInfo {
                column_name: "id".to_string(),
                data_type: "integer".to_string(),
                nullable: false,
                character_maximum_length: None,
                column_default: Some("nextval('users_id_seq'::regclass)".to_string()),
            },
            ColumnInfo {
                column_name: "name".to_string(),
                data_type: "character varying".to_string(),
                nullable: true,
                character_maximum_length: Some(100),
                column_default: None,
            },
        ])
    }

    async fn fetch_rows(&self, query: &str, _params: &[Value]) -> Result<Vec<Row>> {
        self.touch();
        if !query.contains("users") {
            return Err(Error::not_found("relation does not exist"));
        }
        let users = self.users.lock().unwrap();
        Ok(users
            .iter()
            .map(|(id, name)| {
                let mut row = Map::new();
                row.insert("id".to_string(), json!(id));
                row.insert("name".to_string(), json!(name));
                row
            })
            .collect())
    }

    async fn execute_write(&self, _query: &str, params: &[Value]) -> Result<u64> {
        self.touch();
        let name = params
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| Error::execution("expected a name parameter"))?;
        let mut users = self.users.lock().unwrap();
        let id = users.len() as i64 + 1;
        users.push((id, name.to_string()));
        Ok(1)
    }

    async fn count_rows(&self, _table: &TableRef) -> Result<i64> {
        self.touch();
        Ok(self.users.lock().unwrap().len() as i64)
    }
}

struct Client {
    writer: tokio::io::WriteHalf<DuplexStream>,
    lines: Lines<BufReader<tokio::io::ReadHalf<DuplexStream>>>,
    next_id: u64,
}

impl Client {
    async fn send_raw(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }

    async fn recv(&mut self) -> Value {
        let line = self.lines.next_line().await.unwrap().expect("server closed");
        serde_json::from_str(&line).unwrap()
    }

    async fn request(&mut self, method: &str, params: Value) -> Value {
        self.next_id += 1;
        let id = self.next_id;
        let message = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
        self.send_raw(&message.to_string()).await;
        let response = self.recv().await;
        assert_eq!(response["id"], id);
        response
    }

    async fn call_tool(&mut self, name: &str, arguments: Value) -> Value {
        let response = self
            .request("tools/call", json!({"name": name, "arguments": arguments}))
            .await;
        response["result"].clone()
    }
}

/// Helper: spin up an McpServer on one end of a duplex pipe.
fn start_session(db: Arc<MemoryDatabase>) -> (Client, tokio::task::JoinHandle<()>) {
    let dispatcher = Dispatcher::with_database_tools(db).unwrap();
    let server = McpServer::new(Arc::new(dispatcher), ServerConfig::default());

    let (client_end, server_end) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server_end);
    let handle = tokio::spawn(async move {
        server
            .serve(BufReader::new(server_read), server_write)
            .await
            .unwrap();
    });

    let (client_read, client_write) = tokio::io::split(client_end);
    let client = Client {
        writer: client_write,
        lines: BufReader::new(client_read).lines(),
        next_id: 0,
    };
    (client, handle)
}

#[tokio::test]
async fn test_initialize_and_list_tools() {
    let (mut client, _handle) = start_session(Arc::new(MemoryDatabase::default()));

    let init = client
        .request(
            "initialize",
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "test", "version": "0"}
            }),
        )
        .await;
    assert_eq!(init["result"]["serverInfo"]["name"], "pgbridge");
    assert!(init["result"]["capabilities"]["tools"].is_object());

    client
        .send_raw(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
        .await;

    let list = client.request("tools/list", json!({})).await;
    let tools = list["result"]["tools"].as_array().unwrap();
    let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
    assert_eq!(
        names,
        vec![
            "list_tables",
            "describe_table",
            "run_read_query",
            "run_write_query",
            "get_table_count",
            "run_custom_sql",
        ]
    );
    let describe = &tools[1]["inputSchema"];
    assert_eq!(describe["required"], json!(["table_name"]));
}

#[tokio::test]
async fn test_users_scenario() {
    let db = Arc::new(MemoryDatabase::with_users(&["alice", "bob"]));
    let (mut client, _handle) = start_session(db);

    let tables = client.call_tool("list_tables", json!({})).await;
    assert_eq!(tables["isError"], false);
    assert_eq!(
        tables["structuredContent"]["tables"],
        json!([{"name": "users", "schema": "public"}])
    );

    let described = client
        .call_tool("describe_table", json!({"table_name": "users"}))
        .await;
    let columns: Vec<&str> = described["structuredContent"]["columns"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["column_name"].as_str().unwrap())
        .collect();
    assert_eq!(columns, vec!["id", "name"]);

    let rows = client
        .call_tool("run_read_query", json!({"query": "SELECT * FROM users"}))
        .await;
    assert_eq!(rows["structuredContent"]["count"], 2);
    assert_eq!(rows["structuredContent"]["rows"][1], json!({"id": 2, "name": "bob"}));
}

#[tokio::test]
async fn test_write_then_read_sees_row_once() {
    let db = Arc::new(MemoryDatabase::default());
    let (mut client, _handle) = start_session(db);

    let written = client
        .call_tool(
            "run_write_query",
            json!({"query": "INSERT INTO users(name) VALUES ($1)", "params": ["carol"]}),
        )
        .await;
    assert_eq!(written["structuredContent"]["rows_affected"], 1);
    assert_eq!(
        written["structuredContent"]["message"],
        "Query executed successfully. 1 row(s) affected."
    );

    let rows = client
        .call_tool("run_read_query", json!({"query": "SELECT name FROM users"}))
        .await;
    assert_eq!(rows["structuredContent"]["count"], 1);

    let count = client
        .call_tool("get_table_count", json!({"table_name": "users"}))
        .await;
    assert_eq!(
        count["structuredContent"],
        json!({"table_name": "users", "count": 1})
    );
}

#[tokio::test]
async fn test_delete_rejected_without_round_trip() {
    let db = Arc::new(MemoryDatabase::with_users(&["alice"]));
    let (mut client, _handle) = start_session(db.clone());

    let result = client
        .call_tool("run_read_query", json!({"query": "DELETE FROM users"}))
        .await;
    assert_eq!(result["isError"], true);
    assert_eq!(
        result["structuredContent"]["error"]["kind"],
        "InvalidOperation"
    );
    assert_eq!(db.round_trips.load(Ordering::SeqCst), 0);
    assert_eq!(db.users.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_tool_failures_are_results() {
    let (mut client, _handle) = start_session(Arc::new(MemoryDatabase::default()));

    let unknown = client.call_tool("nonexistent_tool", json!({})).await;
    assert_eq!(unknown["structuredContent"]["error"]["kind"], "UnknownTool");

    let missing = client.call_tool("describe_table", json!({})).await;
    assert_eq!(
        missing["structuredContent"]["error"],
        json!({"kind": "MissingArgument", "message": "table_name"})
    );

    let not_found = client
        .call_tool("describe_table", json!({"table_name": "nonexistent_table"}))
        .await;
    assert_eq!(not_found["structuredContent"]["error"]["kind"], "NotFound");
    let text = not_found["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("Table 'nonexistent_table' not found"));
}

#[tokio::test]
async fn test_custom_sql_routes_by_statement() {
    let (mut client, _handle) = start_session(Arc::new(MemoryDatabase::with_users(&["a"])));

    let read = client
        .call_tool("run_custom_sql", json!({"sql": "select * from users"}))
        .await;
    assert_eq!(read["structuredContent"]["count"], 1);

    let write = client
        .call_tool(
            "run_custom_sql",
            json!({"sql": "INSERT INTO users(name) VALUES ($1)", "params": ["b"]}),
        )
        .await;
    assert_eq!(write["structuredContent"]["rows_affected"], 1);
}

#[tokio::test]
async fn test_protocol_errors() {
    let (mut client, _handle) = start_session(Arc::new(MemoryDatabase::default()));

    client.send_raw("{this is not json").await;
    let parse = client.recv().await;
    assert_eq!(parse["id"], Value::Null);
    assert_eq!(parse["error"]["code"], -32700);

    let unknown = client.request("resources/list", json!({})).await;
    assert_eq!(unknown["error"]["code"], -32601);

    let bad_params = client.request("tools/call", json!({"arguments": {}})).await;
    assert_eq!(bad_params["error"]["code"], -32602);

    let pong = client.request("ping", Value::Null).await;
    assert_eq!(pong["result"], json!({}));
}

#[tokio::test]
async fn test_session_ends_on_eof() {
    let (client, handle) = start_session(Arc::new(MemoryDatabase::default()));
    drop(client);
    tokio::time::timeout(std::time::Duration::from_secs(5), handle)
        .await
        .expect("server did not stop")
        .unwrap();
}
