//! Interactive session: artist search, selection, then supervised playback

use std::io::{self, BufRead, Write};

use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::model::{ArtistSummary, DeviceInfo, DeviceRef, RemoteMusicService, TrackSet};
use super::resolver::resolve_tracks;
use super::scheduler::Scheduler;
use super::supervisor::{PlaybackSupervisor, SupervisorEvent, SupervisorSettings};

const RULE_WIDTH: usize = 60;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSettings {
    pub search_limit: u32,
    pub album_page_size: u32,
    pub supervisor: SupervisorSettings,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            search_limit: 10,
            album_page_size: 50,
            supervisor: SupervisorSettings::default(),
        }
    }
}

/// Parsed answer to the artist menu
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MenuChoice {
    Artist(usize),
    NewSearch,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChoiceError {
    OutOfRange,
    NotANumber,
}

/// Interpret menu input: `n` starts over, `1..=count` picks an artist
/// (returned as a zero-based index).
pub fn parse_choice(input: &str, count: usize) -> Result<MenuChoice, ChoiceError> {
    let input = input.trim().to_lowercase();
    if input == "n" {
        return Ok(MenuChoice::NewSearch);
    }
    let number: usize = input.parse().map_err(|_| ChoiceError::NotANumber)?;
    if (1..=count).contains(&number) {
        Ok(MenuChoice::Artist(number - 1))
    } else {
        Err(ChoiceError::OutOfRange)
    }
}

/// Active device if there is one, otherwise the first listed
pub fn choose_device(devices: &[DeviceInfo]) -> Option<&DeviceInfo> {
    devices.iter().find(|d| d.is_active).or_else(|| devices.first())
}

pub fn format_count(value: u32) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn render_artists(artists: &[ArtistSummary]) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut out = format!("\n{}\nSearch Results:\n{}\n", rule, rule);
    for (i, artist) in artists.iter().enumerate() {
        let genres = if artist.genres.is_empty() {
            "No genres listed".to_string()
        } else {
            artist.genres.iter().take(3).cloned().collect::<Vec<_>>().join(", ")
        };
        out.push_str(&format!("{}. {}\n", i + 1, artist.name));
        out.push_str(&format!(
            "   Followers: {} | Genres: {}\n\n",
            format_count(artist.followers),
            genres
        ));
    }
    out.push_str(&rule);
    out.push('\n');
    out
}

/// Forward stdin lines to a channel from a plain thread, so a pending read
/// never holds up runtime shutdown.
pub fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn spawn_event_printer(mut events: mpsc::UnboundedReceiver<SupervisorEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            println!("[{}] {}", Local::now().format("%H:%M:%S"), event);
        }
    })
}

fn print_banner(title: &str) {
    let rule = "=".repeat(RULE_WIDTH);
    println!("\n{}\n{}\n{}", rule, title, rule);
}

pub struct Session<'a> {
    service: &'a dyn RemoteMusicService,
    scheduler: &'a dyn Scheduler,
    settings: SessionSettings,
    input: mpsc::UnboundedReceiver<String>,
}

impl<'a> Session<'a> {
    pub fn new(
        service: &'a dyn RemoteMusicService,
        scheduler: &'a dyn Scheduler,
        settings: SessionSettings,
        input: mpsc::UnboundedReceiver<String>,
    ) -> Self {
        Self {
            service,
            scheduler,
            settings,
            input,
        }
    }

    /// Run until interrupted (`Ok`) or until something the session cannot
    /// recover from happens (`Err`, exit code 1).
    pub async fn run(&mut self) -> Result<()> {
        loop {
            let Some(query) = self.prompt("\nEnter artist name to search: ").await? else {
                self.exit_interrupted();
                return Ok(());
            };
            if query.is_empty() {
                println!("Please enter an artist name.");
                continue;
            }

            println!("Searching for '{}'...", query);
            let artists = match self.service.search_artists(&query, self.settings.search_limit).await {
                Ok(artists) => artists,
                Err(e) => {
                    tracing::warn!(query = %query, error = %e, "Artist search failed");
                    println!("Search failed: {}", e.describe());
                    continue;
                }
            };
            if artists.is_empty() {
                println!("No artists found. Try again.");
                continue;
            }
            print!("{}", render_artists(&artists));

            let artist = match self.choose_artist(&artists).await? {
                Some(MenuChoice::Artist(index)) => &artists[index],
                Some(MenuChoice::NewSearch) => continue,
                None => {
                    self.exit_interrupted();
                    return Ok(());
                }
            };
            println!("\nSelected: {}", artist.name);
            tracing::info!(artist = %artist.name, artist_id = %artist.id, "Artist selected");

            let Some(tracks) = self.load_tracks(artist).await? else {
                self.exit_interrupted();
                return Ok(());
            };
            if tracks.is_empty() {
                println!("No tracks found for this artist.");
                continue;
            }

            return self.play(tracks).await;
        }
    }

    async fn choose_artist(&mut self, artists: &[ArtistSummary]) -> Result<Option<MenuChoice>> {
        let prompt = format!("Enter number (1-{}) or 'n' for new search: ", artists.len());
        loop {
            let Some(input) = self.prompt(&prompt).await? else {
                return Ok(None);
            };
            match parse_choice(&input, artists.len()) {
                Ok(choice) => return Ok(Some(choice)),
                Err(ChoiceError::OutOfRange) => println!("Invalid number."),
                Err(ChoiceError::NotANumber) => println!("Please enter a number or 'n'."),
            }
        }
    }

    async fn load_tracks(&self, artist: &ArtistSummary) -> Result<Option<TrackSet>> {
        println!("\nLoading tracks from {}...", artist.name);
        let token = self.scheduler.token().clone();
        let resolved = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(None),
            resolved = resolve_tracks(self.service, &artist.id, self.settings.album_page_size) => resolved,
        };
        let tracks = resolved
            .map_err(|e| anyhow!(e.describe()))
            .with_context(|| format!("Failed to load tracks for {}", artist.name))?;
        println!("Loaded {} tracks", tracks.len());
        Ok(Some(tracks))
    }

    async fn play(&self, tracks: TrackSet) -> Result<()> {
        let token = self.scheduler.token().clone();
        let listed = tokio::select! {
            biased;
            _ = token.cancelled() => {
                self.exit_interrupted();
                return Ok(());
            }
            listed = self.service.devices() => listed,
        };
        let devices = listed
            .map_err(|e| anyhow!(e.describe()))
            .context("Failed to list Spotify devices")?;
        let Some(device) = choose_device(&devices) else {
            println!("\nNo active Spotify devices found.");
            println!("Please open Spotify on this device or another device first.");
            bail!("no playback device available");
        };
        println!("Using device: {}", device.name);
        tracing::info!(device_name = %device.name, device_id = %device.id, "Device selected");

        let (tx, rx) = mpsc::unbounded_channel();
        let printer = spawn_event_printer(rx);

        let mut supervisor = PlaybackSupervisor::new(
            self.service,
            self.scheduler,
            &tracks,
            DeviceRef::new(device.id.clone()),
            self.settings.supervisor.clone(),
            tx,
        )?;

        let started = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            started = supervisor.start() => Some(started),
        };
        match started {
            Some(Ok(())) => {}
            Some(Err(e)) => {
                drop(supervisor);
                let _ = printer.await;
                println!("Error starting playback: {}", e);
                return Err(e.into());
            }
            None => {
                drop(supervisor);
                let _ = printer.await;
                self.exit_interrupted();
                return Ok(());
            }
        }

        print_banner("Playback Monitor Active");
        println!("Press Ctrl+C to stop");
        println!("You can now disconnect - playback will continue.\n");

        let result = supervisor.run().await;
        let _ = printer.await;
        result.map_err(Into::into)
    }

    /// Next trimmed input line, `None` once interrupted
    async fn prompt(&mut self, message: &str) -> Result<Option<String>> {
        print!("{}", message);
        io::stdout().flush()?;

        let token = self.scheduler.token().clone();
        let line = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(None),
            line = self.input.recv() => line,
        };
        match line {
            Some(line) => Ok(Some(line.trim().to_string())),
            None => bail!("input closed before an artist was selected"),
        }
    }

    fn exit_interrupted(&self) {
        tracing::info!("Session interrupted");
        println!("\n\nExiting...");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::scheduler::testing::ManualScheduler;
    use crate::model::fake::{playing, tracks, Call, FakeService};

    fn artist(id: &str, name: &str) -> ArtistSummary {
        ArtistSummary {
            id: id.to_string(),
            name: name.to_string(),
            followers: 1_234_567,
            genres: vec!["rock".into(), "indie".into(), "pop".into(), "jazz".into()],
        }
    }

    fn device(id: &str, active: bool) -> DeviceInfo {
        DeviceInfo {
            id: id.to_string(),
            name: format!("Speaker {}", id),
            is_active: active,
        }
    }

    fn catalog() -> FakeService {
        let mut service = FakeService::new();
        service.artists = vec![artist("a1", "First"), artist("a2", "Second")];
        service.top_tracks = tracks(&["1", "2"]);
        service.albums = vec![("album".to_string(), tracks(&["2", "3"]))];
        service.devices = vec![device("d1", false), device("d2", true)];
        service.set_playback_fallback(playing("1"));
        service
    }

    fn input(lines: &[&str]) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        for line in lines {
            tx.send(line.to_string()).unwrap();
        }
        rx
    }

    #[test]
    fn parse_choice_accepts_numbers_in_range_and_n() {
        assert_eq!(parse_choice("1", 3), Ok(MenuChoice::Artist(0)));
        assert_eq!(parse_choice(" 3 ", 3), Ok(MenuChoice::Artist(2)));
        assert_eq!(parse_choice("N", 3), Ok(MenuChoice::NewSearch));
        assert_eq!(parse_choice("0", 3), Err(ChoiceError::OutOfRange));
        assert_eq!(parse_choice("4", 3), Err(ChoiceError::OutOfRange));
        assert_eq!(parse_choice("two", 3), Err(ChoiceError::NotANumber));
    }

    #[test]
    fn choose_device_prefers_active() {
        let devices = vec![device("d1", false), device("d2", true)];
        assert_eq!(choose_device(&devices).map(|d| d.id.as_str()), Some("d2"));

        let idle = vec![device("d1", false), device("d3", false)];
        assert_eq!(choose_device(&idle).map(|d| d.id.as_str()), Some("d1"));

        assert!(choose_device(&[]).is_none());
    }

    #[test]
    fn counts_get_thousands_separators() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(1_234_567), "1,234,567");
    }

    #[test]
    fn artist_listing_shows_three_genres() {
        let mut quiet = artist("a2", "Quiet");
        quiet.genres.clear();
        let text = render_artists(&[artist("a1", "Loud"), quiet]);

        assert!(text.contains("1. Loud\n   Followers: 1,234,567 | Genres: rock, indie, pop\n"));
        assert!(text.contains("2. Quiet\n   Followers: 1,234,567 | Genres: No genres listed\n"));
        assert!(!text.contains("jazz"));
    }

    #[tokio::test]
    async fn selection_starts_and_supervises_playback() {
        let service = catalog();
        let scheduler = ManualScheduler::cancel_after(1);
        let mut session = Session::new(&service, &scheduler, SessionSettings::default(), input(&["muse", "2"]));

        session.run().await.unwrap();

        let calls = service.calls();
        assert_eq!(calls[0], Call::Search("muse".to_string()));
        assert!(calls.contains(&Call::TopTracks("a2".to_string())));

        let commands = service.commands();
        assert_eq!(commands.len(), 3);
        match &commands[0] {
            Call::Start { device, tracks } => {
                assert_eq!(device, "d2");
                assert_eq!(tracks.len(), 3);
            }
            other => panic!("expected start, got {:?}", other),
        }
        assert_eq!(scheduler.delays().len(), 1);
    }

    #[tokio::test]
    async fn bad_menu_input_reprompts_and_n_searches_again() {
        let service = catalog();
        let scheduler = ManualScheduler::cancel_after(1);
        let lines = ["", "muse", "abc", "9", "n", "muse", "1"];
        let mut session = Session::new(&service, &scheduler, SessionSettings::default(), input(&lines));

        session.run().await.unwrap();

        let searches = service.calls().into_iter().filter(|c| matches!(c, Call::Search(_))).count();
        assert_eq!(searches, 2);
        assert!(service.calls().contains(&Call::TopTracks("a1".to_string())));
    }

    #[tokio::test]
    async fn empty_catalog_never_reaches_the_supervisor() {
        let mut service = catalog();
        service.top_tracks.clear();
        service.albums.clear();
        let scheduler = ManualScheduler::cancel_after(1);
        let mut session = Session::new(&service, &scheduler, SessionSettings::default(), input(&["muse", "1"]));

        // Back at the search prompt with no more input
        assert!(session.run().await.is_err());
        assert!(service.commands().is_empty());
        assert!(!service.calls().contains(&Call::Devices));
    }

    #[tokio::test]
    async fn missing_device_is_fatal() {
        let mut service = catalog();
        service.devices.clear();
        let scheduler = ManualScheduler::new();
        let mut session = Session::new(&service, &scheduler, SessionSettings::default(), input(&["muse", "1"]));

        let err = session.run().await.unwrap_err();
        assert!(err.to_string().contains("no playback device"));
        assert!(service.commands().is_empty());
    }

    #[tokio::test]
    async fn failed_initial_start_is_fatal_and_skips_supervision() {
        let service = catalog();
        service.fail_next_starts(1);
        let scheduler = ManualScheduler::new();
        let mut session = Session::new(&service, &scheduler, SessionSettings::default(), input(&["muse", "1"]));

        assert!(session.run().await.is_err());
        assert_eq!(service.commands().len(), 1);
        assert!(!service.calls().contains(&Call::CurrentPlayback));
        assert!(scheduler.delays().is_empty());
    }

    #[tokio::test]
    async fn interrupt_during_device_lookup_sends_no_commands() {
        let service = catalog();
        let scheduler = ManualScheduler::new();
        service.interrupt_on(|call| matches!(call, Call::Devices), scheduler.token().clone());
        let mut session = Session::new(&service, &scheduler, SessionSettings::default(), input(&["x", "1"]));

        assert!(session.run().await.is_ok());
        assert!(service.commands().is_empty());
        assert!(!service.calls().contains(&Call::CurrentPlayback));
    }

    #[tokio::test]
    async fn interrupt_during_first_start_skips_repeat_and_shuffle() {
        let service = catalog();
        let scheduler = ManualScheduler::new();
        service.interrupt_on(|call| matches!(call, Call::Start { .. }), scheduler.token().clone());
        let mut session = Session::new(&service, &scheduler, SessionSettings::default(), input(&["x", "1"]));

        assert!(session.run().await.is_ok());
        let commands = service.commands();
        assert_eq!(commands.len(), 1);
        assert!(matches!(commands[0], Call::Start { .. }));
        assert!(!service.calls().contains(&Call::CurrentPlayback));
        assert!(scheduler.delays().is_empty());
    }

    #[tokio::test]
    async fn interrupt_at_prompt_exits_cleanly() {
        let service = catalog();
        let scheduler = ManualScheduler::new();
        scheduler.token().cancel();
        let (_tx, rx) = mpsc::unbounded_channel();
        let mut session = Session::new(&service, &scheduler, SessionSettings::default(), rx);

        assert!(session.run().await.is_ok());
        assert!(service.calls().is_empty());
    }
}
