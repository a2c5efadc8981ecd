//! Login and character creation dialogue, run on a fresh connection before it
//! is bound to an entity.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use log::{info, warn};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use mud_shared::ansi::colorize;
use mud_shared::telnet::{ECHO_OFF, ECHO_ON};
use mud_shared::{PlayerProfile, STAT_NAMES};

use super::line::LineReader;
use crate::entities::player::{capitalize, create_profile, gender_name, roll_stats, valid_name, NewCharacter, RACES};
use crate::error::{MudError, MudResult};
use crate::persistence::PersistenceHandle;

const PASSWORD_ATTEMPTS: usize = 3;
const MIN_PASSWORD_LEN: usize = 5;

/// Hash a password into an Argon2 PHC string.
pub fn hash_password(password: &str) -> MudResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| MudError::Auth(e.to_string()))?
        .to_string();
    Ok(hash)
}

/// Check a password against a stored hash. A malformed hash never matches.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let parsed = match PasswordHash::new(stored) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Stored password hash is malformed: {}", e);
            return false;
        }
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Rolled stats as shown on the creation screen, e.g. `Str: 12  Int: 9 ...`.
fn stat_line(stats: &[u16; 6]) -> String {
    STAT_NAMES
        .iter()
        .zip(stats.iter())
        .map(|(name, value)| format!("{}: {}", name, value))
        .collect::<Vec<_>>()
        .join("  ")
}

/// Outcome of a successful dialogue
#[derive(Debug)]
pub struct Login {
    pub profile: PlayerProfile,
    pub created: bool,
}

/// Prompt/answer exchange over a framed reader and a raw writer.
pub struct LoginDialog<'a, R, W> {
    reader: &'a mut LineReader<R>,
    writer: &'a mut W,
    persistence: Option<&'a PersistenceHandle>,
    start_room: u64,
}

impl<'a, R, W> LoginDialog<'a, R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(
        reader: &'a mut LineReader<R>,
        writer: &'a mut W,
        persistence: Option<&'a PersistenceHandle>,
        start_room: u64,
    ) -> Self {
        Self {
            reader,
            writer,
            persistence,
            start_room,
        }
    }

    async fn write(&mut self, text: &str) -> MudResult<()> {
        self.writer.write_all(colorize(text).as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Send a prompt and wait for the answer. A closed connection is an
    /// I/O error so the dialogue unwinds with `?`.
    async fn ask(&mut self, prompt: &str) -> MudResult<String> {
        self.write(prompt).await?;
        let line = self.reader.read_line().await?;
        let replies = self.reader.take_replies();
        if !replies.is_empty() {
            self.writer.write_all(&replies).await?;
        }
        line.ok_or_else(|| {
            MudError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed during login",
            ))
        })
    }

    /// Like `ask` with local echo switched off for the answer.
    async fn ask_secret(&mut self, prompt: &str) -> MudResult<String> {
        self.writer.write_all(&ECHO_OFF).await?;
        let answer = self.ask(prompt).await;
        self.writer.write_all(&ECHO_ON).await?;
        self.write("\r\n").await?;
        answer
    }

    async fn confirm(&mut self, prompt: &str) -> MudResult<bool> {
        loop {
            let answer = self.ask(prompt).await?.to_lowercase();
            match answer.chars().next() {
                Some('y') => return Ok(true),
                Some('n') => return Ok(false),
                _ => self.write("Please answer Y or N.\r\n").await?,
            }
        }
    }

    async fn load(&self, name: &str) -> MudResult<Option<PlayerProfile>> {
        match self.persistence {
            Some(persistence) => persistence.load_player(name).await,
            None => Ok(None),
        }
    }

    /// Run the whole dialogue: name, then password for a known character
    /// or the creation questions for a new one.
    pub async fn run(mut self) -> MudResult<Login> {
        loop {
            let answer = self.ask("By what name do you wish to be known? ").await?;
            if !valid_name(&answer) {
                self.write("Illegal name, try another.\r\n").await?;
                continue;
            }
            let name = capitalize(&answer);

            if let Some(profile) = self.load(&name).await? {
                return self.authenticate(profile).await.map(|profile| Login {
                    profile,
                    created: false,
                });
            }

            if self
                .confirm(&format!("Did I get that right, {} (Y/N)? ", name))
                .await?
            {
                if let Some(profile) = self.create(name).await? {
                    return Ok(Login {
                        profile,
                        created: true,
                    });
                }
            }
        }
    }

    async fn authenticate(&mut self, profile: PlayerProfile) -> MudResult<PlayerProfile> {
        if profile.banned {
            self.write("&RYou have been banned from this game.&d\r\n").await?;
            return Err(MudError::Auth(format!("{} is banned", profile.char.name)));
        }
        for _ in 0..PASSWORD_ATTEMPTS {
            let password = self.ask_secret("Password: ").await?;
            if verify_password(&password, &profile.password) {
                return Ok(profile);
            }
            self.write("Wrong password.\r\n").await?;
        }
        Err(MudError::Auth(format!(
            "too many password attempts for {}",
            profile.char.name
        )))
    }

    /// Ask the creation questions and claim the name. `None` if somebody
    /// else claimed it first.
    async fn create(&mut self, name: String) -> MudResult<Option<PlayerProfile>> {
        self.write(&format!("New character.\r\nGive me a password for {}.\r\n", name))
            .await?;
        let password = loop {
            let first = self.ask_secret("Password: ").await?;
            if first.chars().count() < MIN_PASSWORD_LEN {
                self.write(&format!(
                    "Password must be at least {} characters long.\r\n",
                    MIN_PASSWORD_LEN
                ))
                .await?;
                continue;
            }
            let again = self.ask_secret("Please retype password: ").await?;
            if first == again {
                break first;
            }
            self.write("Passwords don't match.\r\n").await?;
        };

        let email = loop {
            let email = self.ask("What is your email address? ").await?;
            if email.contains('@') && !email.contains(char::is_whitespace) {
                break email;
            }
            self.write("That doesn't look like an email address.\r\n").await?;
        };

        let race = loop {
            let list = RACES.join(", ");
            let answer = self
                .ask(&format!("Choose a race from: {}\r\nRace: ", list))
                .await?
                .to_lowercase();
            let found = RACES
                .iter()
                .find(|r| !answer.is_empty() && r.to_lowercase().starts_with(&answer));
            match found {
                Some(race) => break race.to_string(),
                None => self.write("That is not a race.\r\n").await?,
            }
        };

        let gender = loop {
            let answer = self.ask("What is your gender (M/F/N)? ").await?.to_lowercase();
            match answer.chars().next() {
                Some(c @ ('m' | 'f' | 'n')) => break c.to_string(),
                _ => self.write("That is not a gender.\r\n").await?,
            }
        };

        let stats = loop {
            let stats = roll_stats(&mut rand::thread_rng());
            self.write(&format!("{}\r\n", stat_line(&stats))).await?;
            if self.confirm("Keep these stats (Y/N)? ").await? {
                break stats;
            }
        };

        let password_hash = hash_password(&password)?;
        let new = NewCharacter {
            name,
            password_hash,
            email,
            race,
            gender,
            stats,
        };
        let profile = create_profile(new, self.start_room, &mut rand::thread_rng());
        if let Some(persistence) = self.persistence {
            if !persistence.create_player(profile.clone()).await? {
                warn!("{} was created by another connection first", profile.char.name);
                self.write("Someone has just taken that name. Please choose another.\r\n")
                    .await?;
                return Ok(None);
            }
        }
        info!(
            "New character {} ({} {})",
            profile.char.name,
            gender_name(&profile.char.gender),
            profile.char.race
        );
        Ok(Some(profile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{self, store::tests::temp_store};
    use tokio::io::{duplex, AsyncReadExt};

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("hunter23", &hash));
        assert!(!verify_password("hunter22", "not-a-hash"));
    }

    #[test]
    fn test_stat_line_follows_stat_indices() {
        use mud_shared::{STAT_DEX, STAT_WIS};
        let mut stats = [10u16; 6];
        stats[STAT_DEX] = 17;
        stats[STAT_WIS] = 4;
        let line = stat_line(&stats);
        assert!(line.contains("Dex: 17"));
        assert!(line.contains("Wis: 4"));
        assert!(line.starts_with("Str: 10  Int: 10  Dex: 17  Wis: 4"));
    }

    /// Feed scripted answers into a dialogue and collect its result plus
    /// everything it wrote.
    async fn run_dialogue(
        input: &str,
        persistence: Option<&PersistenceHandle>,
    ) -> (MudResult<Login>, String) {
        let (mut client, server) = duplex(64 * 1024);
        let (server_rd, mut server_wr) = tokio::io::split(server);
        client.write_all(input.as_bytes()).await.unwrap();
        client.shutdown().await.unwrap();

        let mut reader = LineReader::new(server_rd);
        let result = LoginDialog::new(&mut reader, &mut server_wr, persistence, 100)
            .run()
            .await;
        drop(server_wr);
        drop(reader);

        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        (result, String::from_utf8_lossy(&out).into_owned())
    }

    #[tokio::test]
    async fn test_new_character_dialogue() {
        let store = temp_store("auth-new");
        let handle = persistence::init(store);
        let script = "x1\nhan\ny\npass\nsecret\nsecret\nnope\nhan@falcon.space\nwook\nq\nm\nn\ny\n";
        let (result, out) = run_dialogue(script, Some(&handle)).await;

        let login = result.unwrap();
        assert!(login.created);
        assert_eq!(login.profile.char.name, "Han");
        assert_eq!(login.profile.char.race, "Wookiee");
        assert_eq!(login.profile.char.gender, "m");
        assert_eq!(login.profile.char.room, 100);
        assert!(verify_password("secret", &login.profile.password));
        assert!(out.contains("Illegal name"));
        assert!(out.contains("at least 5 characters"));
        assert!(out.contains("email address"));
        assert!(out.contains("That is not a gender."));

        let saved = handle.load_player("Han").await.unwrap();
        assert_eq!(saved.map(|p| p.char.race), Some("Wookiee".to_string()));
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_existing_character_password() {
        let store = temp_store("auth-existing");
        let mut profile = persistence::store::tests::profile("Leia");
        profile.password = hash_password("alderaan").unwrap();
        store.save_player(&profile).unwrap();
        let handle = persistence::init(store);

        let (result, out) = run_dialogue("leia\nwrong\nalderaan\n", Some(&handle)).await;
        let login = result.unwrap();
        assert!(!login.created);
        assert_eq!(login.profile.char.name, "Leia");
        assert!(out.contains("Wrong password."));
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_banned_and_lockout() {
        let store = temp_store("auth-banned");
        let mut banned = persistence::store::tests::profile("Jabba");
        banned.banned = true;
        store.save_player(&banned).unwrap();
        let mut luke = persistence::store::tests::profile("Luke");
        luke.password = hash_password("tatooine").unwrap();
        store.save_player(&luke).unwrap();
        let handle = persistence::init(store);

        let (result, out) = run_dialogue("jabba\n", Some(&handle)).await;
        assert!(matches!(result, Err(MudError::Auth(_))));
        assert!(out.contains("banned"));

        let (result, _) = run_dialogue("luke\na\nb\nc\n", Some(&handle)).await;
        assert!(matches!(result, Err(MudError::Auth(_))));
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_name_claimed_during_creation() {
        let store = temp_store("auth-claimed");
        let handle = persistence::init(store);
        let (mut client, server) = duplex(64 * 1024);
        let dialogue_handle = handle.clone();
        let dialogue = tokio::spawn(async move {
            let (rd, mut wr) = tokio::io::split(server);
            let mut reader = LineReader::new(rd);
            LoginDialog::new(&mut reader, &mut wr, Some(&dialogue_handle), 100)
                .run()
                .await
        });

        client.write_all(b"han\ny\n").await.unwrap();
        let mut seen = Vec::new();
        let mut buf = [0u8; 1024];
        while !String::from_utf8_lossy(&seen).contains("Give me a password") {
            let n = client.read(&mut buf).await.unwrap();
            assert!(n > 0);
            seen.extend_from_slice(&buf[..n]);
        }

        // Another connection finishes creating Han while this one is still
        // answering questions.
        let mut rival = persistence::store::tests::profile("Han");
        rival.password = "rival-hash".into();
        assert!(handle.create_player(rival).await.unwrap());

        client
            .write_all(b"secret\nsecret\nhan@falcon.space\nhuman\nm\ny\n")
            .await
            .unwrap();
        client.shutdown().await.unwrap();
        let result = dialogue.await.unwrap();
        client.read_to_end(&mut seen).await.unwrap();

        assert!(matches!(result, Err(MudError::Io(_))));
        assert!(String::from_utf8_lossy(&seen).contains("Someone has just taken that name."));
        let saved = handle.load_player("Han").await.unwrap().unwrap();
        assert_eq!(saved.password, "rival-hash");
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_hangup_during_login() {
        let (result, _) = run_dialogue("chewie\n", None).await;
        assert!(matches!(result, Err(MudError::Io(_))));
    }
}
