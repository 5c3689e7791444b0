//! Interactive shell for a local `samyama` storage host.
//!
//! Lines beginning with `:` are local commands (`:help`, `:quit`); anything
//! else is a small fixed command grammar forwarded straight to the
//! in-process [`StorageService`] — this is the CLI's query-engine boundary,
//! the seam a real Cypher-like front end would sit behind. Exit codes follow
//! `samyama::Error::cli_exit_code`: 0 success, 1 auth/user error, 2 syntax/
//! semantic error, 3 storage error.

use anyhow::{Context, Result};
use samyama::admin::{JobCommand, JobManager};
use samyama::codec::{Column, ColumnType, SchemaBuilder, SchemaOwner, Value};
use samyama::index::IndexManager;
use samyama::{
    ClusterConfig, Direction, Error, ExecContext, FetchSpec, FetchTarget, GoSpec, KvEngine, PlanNode, SessionManager,
    Space, SpaceManager, StorageService,
};
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

const SPACE_ID: u32 = 1;
const TAG_ID: u32 = 1;
const EDGE_TYPE: i32 = 1;

async fn bootstrap() -> Result<StorageService> {
    let config = ClusterConfig::default();
    let kv = Arc::new(KvEngine::open(&config.storage.data_path, &[]).context("opening kv engine")?);
    kv.create_space(SPACE_ID)?;

    let schema = Arc::new(samyama::codec::SchemaRegistry::new());
    schema.install(
        SPACE_ID,
        SchemaOwner::Tag(TAG_ID),
        SchemaBuilder::new(0).column(Column::new("name", ColumnType::String)).build()?,
    )?;
    schema.install(
        SPACE_ID,
        SchemaOwner::Edge(EDGE_TYPE),
        SchemaBuilder::new(0).column(Column::new("weight", ColumnType::Int)).build()?,
    )?;

    let spaces = Arc::new(SpaceManager::new());
    spaces.create(Space::new(SPACE_ID, "default", config.default_partition_count.max(1), config.default_replica_factor.max(1)))?;

    Ok(StorageService { schema, kv, index: Arc::new(IndexManager::new()), spaces })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let storage = match bootstrap().await {
        Ok(s) => s,
        Err(err) => {
            eprintln!("failed to start: {err}");
            std::process::exit(3);
        }
    };

    // A single local session stands in for `authenticate(user, pass)`
    // (spec.md §6); a real deployment signs in once per client connection.
    let sessions = SessionManager::new(Duration::from_secs(8 * 3600));
    let session_id = match sessions.authenticate("root", "nebula") {
        Ok(id) => id,
        Err(err) => {
            eprintln!("authentication failed: {err}");
            std::process::exit(err.cli_exit_code());
        }
    };
    if let Err(err) = sessions.set_current_space(session_id, SPACE_ID) {
        eprintln!("failed to start: {err}");
        std::process::exit(3);
    }
    let jobs = JobManager::new();

    println!("samyama shell — space 'default', tag_id {TAG_ID}, edge_type {EDGE_TYPE}");
    println!("Type :help for commands, :quit to exit.\n");

    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        print!("samyama> ");
        std::io::stdout().flush().ok();
        line.clear();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) => {
                eprintln!("read error: {err}");
                break;
            }
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Err(err) = sessions.touch(session_id) {
            eprintln!("error: {err}");
            std::process::exit(err.cli_exit_code());
        }
        if trimmed.starts_with(':') {
            if handle_local_command(trimmed, &storage, &sessions, session_id, &jobs).await {
                break;
            }
            continue;
        }

        if let Err(err) = run_line(&storage, trimmed).await {
            eprintln!("error: {err}");
        }
    }
    sessions.signout(session_id);
    println!("bye");
}

async fn handle_local_command(
    cmd: &str,
    storage: &StorageService,
    sessions: &SessionManager,
    session_id: u64,
    jobs: &JobManager,
) -> bool {
    let parts: Vec<&str> = cmd.split_whitespace().collect();
    match parts.as_slice() {
        [":quit"] | [":exit"] | [":q"] => return true,
        [":version"] => println!("{}", samyama::VERSION),
        [":whoami"] => match (sessions.user(session_id), sessions.idle_duration(session_id)) {
            (Ok(user), Ok(idle)) => println!("{user} (idle {idle:?})"),
            (Err(err), _) | (_, Err(err)) => println!("error: {err}"),
        },
        [":set", name, value] => {
            sessions.globals.set(*name, Value::String(value.as_bytes().to_vec()));
            println!("ok");
        }
        [":get", name] => match sessions.globals.get(name) {
            Some(v) => println!("{v:?}"),
            None => println!("(unset)"),
        },
        [":compact"] => {
            let id = jobs.add_job(JobCommand::Compact, vec!["default".into()], &["localhost".into()], true);
            match storage.compact(SPACE_ID).await {
                Ok(()) => jobs.report_task(id, "localhost", samyama::admin::TaskStatus::Finished).ok(),
                Err(_) => jobs.report_task(id, "localhost", samyama::admin::TaskStatus::Failed).ok(),
            };
            println!("job {id} submitted");
        }
        [":flush"] => {
            let id = jobs.add_job(JobCommand::Flush, vec!["default".into()], &["localhost".into()], true);
            match storage.flush(SPACE_ID).await {
                Ok(()) => jobs.report_task(id, "localhost", samyama::admin::TaskStatus::Finished).ok(),
                Err(_) => jobs.report_task(id, "localhost", samyama::admin::TaskStatus::Failed).ok(),
            };
            println!("job {id} submitted");
        }
        [":jobs"] => {
            for job in jobs.show_jobs() {
                println!("{:>4}  {:?}  {:?}", job.id, job.cmd, job.status);
            }
        }
        [":help"] | [":h"] => {
            println!("Commands:");
            println!("  INSERT VERTEX <vid> <name>");
            println!("  INSERT EDGE <src> <dst> [weight]");
            println!("  FETCH <vid>");
            println!("  GO <hops> <vid>");
            println!("  :set <name> <value>   set a session-global variable");
            println!("  :get <name>           read a session-global variable");
            println!("  :compact / :flush     submit an admin job against the default space");
            println!("  :jobs                 list admin jobs and their status");
            println!("  :whoami               show the current session's user");
            println!("  :version              show crate version");
            println!("  :quit                 exit the shell");
        }
        _ => println!("unknown command: {cmd}"),
    }
    false
}

async fn run_line(storage: &StorageService, line: &str) -> Result<()> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    match parts.as_slice() {
        ["INSERT", "VERTEX", vid, name] => {
            let vid: i64 = vid.parse().map_err(|_| anyhow::anyhow!(Error::SyntaxError(format!("bad vid: {vid}"))))?;
            let node = PlanNode::InsertVertex {
                items: vec![samyama::storage::VertexWrite { vid, tag_id: TAG_ID, values: vec![Some(Value::String(name.as_bytes().to_vec()))] }],
                overwrite: true,
            };
            run_plan(storage, node).await?;
            println!("ok");
        }
        ["INSERT", "EDGE", src, dst, rest @ ..] => {
            let src: i64 = src.parse().map_err(|_| anyhow::anyhow!(Error::SyntaxError(format!("bad vid: {src}"))))?;
            let dst: i64 = dst.parse().map_err(|_| anyhow::anyhow!(Error::SyntaxError(format!("bad vid: {dst}"))))?;
            let weight: i64 = rest.first().and_then(|w| w.parse().ok()).unwrap_or(0);
            let node = PlanNode::InsertEdge {
                items: vec![samyama::storage::EdgeWrite { src_vid: src, edge_type: EDGE_TYPE, rank: 0, dst_vid: dst, values: vec![Some(Value::Int(weight))] }],
                overwrite: true,
            };
            run_plan(storage, node).await?;
            println!("ok");
        }
        ["FETCH", vid] => {
            let vid: i64 = vid.parse().map_err(|_| anyhow::anyhow!(Error::SyntaxError(format!("bad vid: {vid}"))))?;
            let node = PlanNode::Fetch {
                input: None,
                spec: FetchSpec { target: FetchTarget::Vertex { tag_id: TAG_ID }, ids_column: None, explicit_ids: vec![vid], yield_columns: vec!["name".into()] },
            };
            let result = run_plan(storage, node).await?;
            for row in result.get_rows() {
                println!("{row:?}");
            }
        }
        ["GO", hops, vid] => {
            let hops: u32 = hops.parse().map_err(|_| anyhow::anyhow!(Error::SyntaxError(format!("bad hop count: {hops}"))))?;
            let vid: i64 = vid.parse().map_err(|_| anyhow::anyhow!(Error::SyntaxError(format!("bad vid: {vid}"))))?;
            let node = PlanNode::Go {
                input: None,
                spec: GoSpec { hops, edge_types: vec![EDGE_TYPE], direction: Direction::Forward, filter: None, sample_limit: None, start_vids_column: None, start_vids: vec![vid] },
            };
            let result = run_plan(storage, node).await?;
            for row in result.get_rows() {
                println!("{row:?}");
            }
        }
        _ => {
            println!("unrecognized command; see :help");
        }
    }
    Ok(())
}

async fn run_plan(storage: &StorageService, node: PlanNode) -> Result<samyama::InterimResult> {
    let mut ctx = ExecContext { space_id: SPACE_ID, ..Default::default() };
    let result = samyama::execute(&node, storage, &mut ctx).await?;
    for warning in &ctx.warnings {
        eprintln!("warning: {warning}");
    }
    Ok(result)
}
