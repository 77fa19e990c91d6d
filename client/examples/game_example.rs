use bestsweep_client::{
    BestsweepGame, CellView, CreateRequest, Difficulty, GameEvent, GameParams, GameState,
    PlayerIdentity, Pos,
};
use tokio::time::{Duration, sleep};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt::init();

    let game = BestsweepGame::new("http://localhost:8000")?;
    let mut event_receiver = game.subscribe_to_events().await;

    let event_handler = tokio::spawn(async move {
        while let Some(event) = event_receiver.recv().await {
            match event {
                GameEvent::GameInitialized {
                    rows,
                    cols,
                    difficulty,
                } => {
                    println!("Game initialized: {}x{} ({})", rows, cols, difficulty);
                }
                GameEvent::BoardUpdated { changed_positions } => {
                    println!("{} cells updated", changed_positions.len());
                }
                GameEvent::Tick { elapsed_seconds } => {
                    println!("{}s", elapsed_seconds);
                }
                GameEvent::GameStatusChanged { state } => {
                    println!("Game is now {:?}", state);
                }
                GameEvent::ConnectionLost => {
                    println!("Connection lost!");
                    break;
                }
            }
        }
    });

    let request = CreateRequest {
        params: GameParams {
            rows: 9,
            cols: 9,
            difficulty: Difficulty::Beginner,
            mines: None,
        },
        player: Some(PlayerIdentity {
            user_id: "example-user".to_string(),
            display_name: "Example".to_string(),
            email: String::new(),
        }),
    };
    game.start_game(request).await?;
    println!("Game started! Game ID: {:?}", game.get_game_id().await);
    sleep(Duration::from_millis(100)).await;

    // The first reveal is always safe and opens at least the 3x3 block around it
    println!("\nRevealing the centre...");
    game.reveal(Pos::new(4, 4)).await?;
    sleep(Duration::from_millis(100)).await;
    if let Some(state) = game.get_state().await {
        display_board(&state);
    }

    println!("\nFlagging (0, 0)...");
    game.flag(Pos::new(0, 0)).await?;
    sleep(Duration::from_millis(100)).await;
    if let Some(state) = game.get_state().await {
        display_board(&state);
        println!("Flags remaining: {}", state.flags_remaining);
        println!("Cell counts: {:?}", state.count_cells());
    }

    println!("\nBeginner top scores:");
    for (rank, entry) in game.top_scores(Difficulty::Beginner).await?.iter().enumerate() {
        println!("  {}. {} {}s", rank + 1, entry.display_name, entry.elapsed_seconds);
    }

    game.disconnect().await?;
    event_handler.abort();
    let _ = event_handler.await;

    Ok(())
}

fn display_board(state: &GameState) {
    for (row, cells) in state.board.iter().enumerate() {
        print!("  ");
        for cell in cells {
            let symbol = match cell {
                CellView::Hidden => "·".to_string(),
                CellView::Flagged => "F".to_string(),
                CellView::Revealed { adjacent: 0 } => " ".to_string(),
                CellView::Revealed { adjacent } => adjacent.to_string(),
                CellView::Mine => "*".to_string(),
            };
            print!("{:>2}", symbol);
        }
        println!("  {}", row);
    }
}
