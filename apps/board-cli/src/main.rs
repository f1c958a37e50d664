use std::{
    io::{self, Write as _},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{anyhow, bail, Result};
use board_core::{
    ApiClient, ApiClientOptions, BoardState, CredentialStore, DropOutcome, FileCredentials,
    TransitionController,
};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use shared::domain::Sector;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "board-cli", about = "Terminal client for the production board")]
struct Args {
    #[arg(long)]
    server_url: Url,
    /// Where the session credential pair is kept between runs.
    #[arg(long, default_value = ".board-session.json")]
    session_file: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a session and persist the credential pair.
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Drop the persisted session.
    Logout,
    /// Print the board for a period, one column per sector.
    Board {
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
        /// Case-insensitive filter over order, client, description, products.
        #[arg(long)]
        search: Option<String>,
    },
    /// Print the aggregate tiles for a period.
    Stats {
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },
    /// Move one order to another sector, with confirmation.
    Move {
        #[arg(long)]
        pedido: i64,
        /// Target sector key (usinagem, marcenaria, montagem, tapecaria,
        /// lustracao, expedicao).
        #[arg(long)]
        sector: String,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let store = Arc::new(CredentialStore::with_persistence(Box::new(
        FileCredentials::new(&args.session_file),
    )));
    store.restore().await?;
    let client = Arc::new(ApiClient::new(
        ApiClientOptions::new(args.server_url.clone()),
        store.clone(),
    )?);

    match args.command {
        Command::Login { username, password } => {
            client.login(&username, &password).await?;
            println!("Sessão iniciada para {username}.");
        }
        Command::Logout => {
            client.logout().await;
            println!("Sessão encerrada.");
        }
        Command::Board { from, to, search } => {
            let mut board = BoardState::new();
            board.load(client.fetch_orders(from, to).await?);
            print_board(&board, search.as_deref().unwrap_or(""));
        }
        Command::Stats { from, to } => {
            let mut board = BoardState::new();
            board.load(client.fetch_orders(from, to).await?);
            let stats = board.stats();
            println!("Total de pedidos: {}", stats.total);
            println!("Em produção:      {}", stats.in_progress);
            println!("Finalizados:      {}", stats.completed);
            println!("Alta prioridade:  {}", stats.high_priority);
        }
        Command::Move {
            pedido,
            sector,
            from,
            to,
            yes,
        } => {
            let target = Sector::from_key(&sector)
                .ok_or_else(|| anyhow!("setor desconhecido: {sector}"))?;
            let mut board = BoardState::new();
            board.load(client.fetch_orders(from, to).await?);
            let task = board
                .get(pedido)
                .ok_or_else(|| anyhow!("pedido {pedido} não encontrado no período"))?
                .clone();

            let mut controller = TransitionController::new(client);
            controller.drag_start(&task)?;
            let pending = match controller.drop_on(target) {
                DropOutcome::NoOp => {
                    println!(
                        "Pedido {} já está em {}.",
                        task.order_number,
                        target.label()
                    );
                    return Ok(());
                }
                DropOutcome::Pending(pending) => pending,
            };

            if !yes && !prompt_confirmation(&pending.describe())? {
                controller.cancel()?;
                println!("Movimentação cancelada.");
                return Ok(());
            }

            let report = controller.confirm(&mut board).await?;
            println!(
                "Pedido {} movido de {} para {}.",
                report.order_number,
                report.from.label(),
                report.to.label()
            );
        }
    }
    Ok(())
}

fn print_board(board: &BoardState, search: &str) {
    let visible = board.search(search);
    for sector in Sector::ALL {
        let column: Vec<_> = visible.iter().filter(|t| t.sector == sector).collect();
        println!("{} ({})", sector.label(), column.len());
        for task in column {
            println!(
                "  {}  {}  [{:?}]",
                task.order_number, task.client, task.priority
            );
        }
    }
}

fn prompt_confirmation(question: &str) -> Result<bool> {
    print!("{question} [s/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    if io::stdin().read_line(&mut answer)? == 0 {
        bail!("entrada encerrada sem confirmação");
    }
    Ok(matches!(answer.trim().to_lowercase().as_str(), "s" | "sim"))
}
