//! TCP listener and the per-connection task.
//!
//! Each accepted socket gets its own task that runs the login dialogue, binds
//! the connection to an entity and then shuttles lines in and `Outbound`
//! messages out until either side hangs up.

use std::net::SocketAddr;
use std::time::Duration;

use log::{info, warn};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use mud_shared::ansi::colorize;
use mud_shared::telnet::SUPPRESS_GA;

use super::auth::{Login, LoginDialog};
use super::editor::{EditTarget, Editor, EditorAction, EDITOR_HELP};
use super::line::LineReader;
use super::Outbound;
use crate::commands::info::do_look;
use crate::entities::item::new_player_id;
use crate::entities::player::Session;
use crate::entities::{Entity, EntityId};
use crate::error::{MudError, MudResult};
use crate::executor::QueuedCommand;
use crate::persistence;
use crate::services::Services;
use crate::world::{lock_world, ClientId, ClientRecord, World};

const BANNER: &str = "\r\n&Y  {name}&d\r\n\r\n  A long time ago in a galaxy far, far away...\r\n\r\n";

/// Accepts connections and spawns a task for each.
pub struct Server {
    listener: TcpListener,
    services: Services,
    next_client: ClientId,
}

impl Server {
    /// Bind the configured address.
    pub async fn bind(services: Services) -> std::io::Result<Self> {
        let listener = TcpListener::bind(&services.config.addr).await?;
        Ok(Self {
            listener,
            services,
            next_client: 1,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept forever. A failed accept is logged and skipped.
    pub async fn run(mut self) -> std::io::Result<()> {
        info!("Listening on {}", self.local_addr()?);
        loop {
            let (stream, addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Accept failed: {}", e);
                    continue;
                }
            };
            if let Err(e) = stream.set_nodelay(true) {
                warn!("Could not set TCP_NODELAY for {}: {}", addr, e);
            }
            let client_id = self.next_client;
            self.next_client += 1;
            let services = self.services.clone();
            tokio::spawn(async move {
                handle_connection(stream, Some(addr), client_id, services).await;
            });
        }
    }
}

/// Drive one connection from greeting to teardown.
pub async fn handle_connection<S>(stream: S, addr: Option<SocketAddr>, client_id: ClientId, services: Services)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (rd, mut writer) = tokio::io::split(stream);
    let mut reader = LineReader::new(rd);
    let (tx, mut rx) = mpsc::unbounded_channel();
    lock_world(&services.world).add_client(ClientRecord::new(client_id, addr, tx.clone()));
    match addr {
        Some(addr) => info!("Connection {} from {}", client_id, addr),
        None => info!("Connection {} opened", client_id),
    }

    let result = async {
        writer.write_all(&SUPPRESS_GA).await?;
        let banner = BANNER.replace("{name}", &services.config.name);
        writer.write_all(colorize(&banner).as_bytes()).await?;

        let limit = Duration::from_secs(u64::from(services.config.idle_timeout_secs));
        let dialog = LoginDialog::new(
            &mut reader,
            &mut writer,
            services.persistence.as_ref(),
            services.config.start_room,
        );
        let outcome = tokio::time::timeout(limit, dialog.run()).await;
        let login = match outcome {
            Ok(login) => login?,
            Err(_) => {
                writer.write_all(b"\r\nIdle timeout.\r\n").await?;
                return Ok(());
            }
        };

        let entered = {
            let mut world = lock_world(&services.world);
            enter_world(&mut world, &services, client_id, &tx, login)
        };
        let entity = match entered {
            Ok(entity) => entity,
            Err(e) => {
                writer
                    .write_all(b"\r\nThat character is already playing. Please log in with its password.\r\n")
                    .await?;
                return Err(e);
            }
        };
        session_loop(&mut reader, &mut writer, &mut rx, &services, client_id, entity).await?;
        Ok::<(), MudError>(())
    }
    .await;

    if let Err(e) = result {
        info!("Connection {} ended: {}", client_id, e);
    }
    let _ = writer.shutdown().await;
    teardown(&services, client_id);
}

/// Bind a freshly logged-in character to this connection. A character that
/// is already in the world is taken over: a live session elsewhere is told
/// to hang up, a linkdead one is simply reattached. Only a password login
/// may take over; a newly created character never replaces a body.
pub fn enter_world(
    world: &mut World,
    services: &Services,
    client_id: ClientId,
    tx: &mpsc::UnboundedSender<Outbound>,
    login: Login,
) -> MudResult<EntityId> {
    let start_room = services.config.start_room;
    let name = login.profile.char.name.clone();

    let (id, returning) = match world.find_player(&name) {
        Some(_) if login.created => {
            warn!("New character {} collides with one already in the world", name);
            return Err(MudError::Auth(format!("{} is already playing", name)));
        }
        Some(id) => {
            let previous = world
                .entity(id)
                .and_then(|e| e.player())
                .and_then(|p| p.session.as_ref())
                .map(|s| s.client_id);
            match previous.and_then(|old| world.client_mut(old)) {
                Some(old) => {
                    old.entity = None;
                    old.send(Outbound::Text("\r\nThis character has connected from elsewhere.\r\n".into()));
                    old.send(Outbound::Close);
                    info!("{} reconnected, closing connection {}", name, old.id);
                }
                None => info!("{} reclaimed a linkdead body", name),
            }
            (id, true)
        }
        None => {
            let mut entity = Entity::from_profile(login.profile);
            if !world.has_room(entity.location()) {
                entity.char.room = start_room;
                entity.char.ship = 0;
            }
            let mut rng = rand::thread_rng();
            if entity.char.id == 0 {
                entity.char.id = new_player_id(&mut rng);
            }
            let id = loop {
                match world.add_entity(entity) {
                    Ok(id) => break id,
                    Err(back) => {
                        entity = back;
                        entity.char.id = new_player_id(&mut rng);
                    }
                }
            };
            (id, false)
        }
    };

    if let Some(e) = world.entity_mut(id) {
        if e.is_dead() {
            e.respawn(start_room);
        }
        if let Some(player) = e.player_mut() {
            player.session = Some(Session::new(client_id, tx.clone()));
        }
    }
    if let Some(client) = world.client_mut(client_id) {
        client.entity = Some(id);
        client.idle = 0;
    }

    if let Some(e) = world.entity(id) {
        let room = e.location();
        if returning {
            e.send("\r\nReconnecting.\r\n");
            world.send_to_room(room, &format!("{} has reconnected.", name), &[id]);
        } else {
            world.send_to_room(room, &format!("{} has entered the game.", name), &[id]);
        }
        info!(
            "{} entered the game{}",
            name,
            if login.created { " for the first time" } else { "" }
        );
    }
    do_look(world, services, id, &[]);
    world.prompt(id);
    Ok(id)
}

/// One line from the client. Raw lines while the editor is open so
/// indentation survives.
async fn next_line<R: AsyncRead + Unpin>(reader: &mut LineReader<R>, raw: bool) -> std::io::Result<Option<String>> {
    if raw {
        reader.read_raw_line().await
    } else {
        reader.read_line().await
    }
}

async fn write_text<W: AsyncWrite + Unpin>(writer: &mut W, text: &str) -> std::io::Result<()> {
    writer.write_all(colorize(text).as_bytes()).await?;
    writer.flush().await
}

async fn session_loop<R, W>(
    reader: &mut LineReader<R>,
    writer: &mut W,
    rx: &mut mpsc::UnboundedReceiver<Outbound>,
    services: &Services,
    client_id: ClientId,
    entity: EntityId,
) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut editor: Option<(Editor, EditTarget)> = None;
    // Text that arrived while the editor owned the screen
    let mut held: Vec<String> = Vec::new();

    loop {
        tokio::select! {
            line = next_line(reader, editor.is_some()) => {
                let Some(line) = line? else { return Ok(()) };
                let replies = reader.take_replies();
                if !replies.is_empty() {
                    writer.write_all(&replies).await?;
                }
                lock_world(&services.world).touch_client(client_id);

                let Some((ed, target)) = editor.as_mut() else {
                    services.queue(QueuedCommand::Line { entity, line, trusted: false });
                    continue;
                };
                let text = match ed.feed(&line) {
                    EditorAction::Continue(Some(msg)) => {
                        write_text(writer, &msg).await?;
                        continue;
                    }
                    EditorAction::Continue(None) => continue,
                    EditorAction::Save(text) => Some(text),
                    EditorAction::Abort => None,
                };
                let target = *target;
                editor = None;
                services.queue(QueuedCommand::EditFinished { entity, target, text });
                for text in held.drain(..) {
                    write_text(writer, &text).await?;
                }
            }
            out = rx.recv() => match out {
                Some(Outbound::Text(text)) if editor.is_some() => held.push(text),
                Some(Outbound::Text(text)) => write_text(writer, &text).await?,
                Some(Outbound::Raw(bytes)) => {
                    writer.write_all(&bytes).await?;
                    writer.flush().await?;
                }
                Some(Outbound::Edit { target, initial }) => {
                    let ed = Editor::new(&initial);
                    write_text(writer, EDITOR_HELP).await?;
                    write_text(writer, &ed.listing()).await?;
                    editor = Some((ed, target));
                }
                Some(Outbound::Close) | None => {
                    for text in held.drain(..) {
                        write_text(writer, &text).await?;
                    }
                    writer.flush().await?;
                    return Ok(());
                }
            },
        }
    }
}

/// Unregister the connection. A still-bound character is saved and left in
/// the world without a session.
fn teardown(services: &Services, client_id: ClientId) {
    let mut world = lock_world(&services.world);
    let Some(record) = world.remove_client(client_id) else {
        return;
    };
    if let Some(id) = record.entity {
        if let Some(e) = world.entity(id) {
            persistence::save_entity(services, e);
        }
        let mut left = None;
        if let Some(e) = world.entity_mut(id) {
            let room = e.location();
            let name = e.name().to_string();
            if let Some(player) = e.player_mut() {
                if player.session.as_ref().map(|s| s.client_id) == Some(client_id) {
                    player.session = None;
                }
            }
            left = Some((room, name));
        }
        if let Some((room, name)) = left {
            world.send_to_room(room, &format!("{} has left.", name), &[id]);
            info!("{} lost link", name);
        }
    }
    info!("Connection {} closed", client_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::tests::test_world;
    use tokio::io::{duplex, AsyncReadExt, DuplexStream};
    use tokio::sync::mpsc::UnboundedReceiver;

    const NEW_CHARACTER: &str = "rey\ny\nscavenger\nscavenger\nrey@jakku.space\nhuman\nf\ny\n";

    async fn read_until(client: &mut DuplexStream, needle: &str) -> String {
        let mut seen = Vec::new();
        let mut buf = [0u8; 1024];
        let wait = async {
            loop {
                let n = client.read(&mut buf).await.unwrap();
                assert!(n > 0, "connection closed before {:?}", needle);
                seen.extend_from_slice(&buf[..n]);
                if String::from_utf8_lossy(&seen).contains(needle) {
                    break;
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(30), wait)
            .await
            .expect("timed out waiting for output");
        String::from_utf8_lossy(&seen).into_owned()
    }

    async fn next_queued(rx: &mut UnboundedReceiver<QueuedCommand>) -> QueuedCommand {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("nothing queued")
            .expect("executor channel closed")
    }

    fn connect(services: &Services, client_id: ClientId) -> (DuplexStream, tokio::task::JoinHandle<()>) {
        let (client, server) = duplex(64 * 1024);
        let task = tokio::spawn(handle_connection(server, None, client_id, services.clone()));
        (client, task)
    }

    #[tokio::test]
    async fn test_login_then_commands_are_queued() {
        let (services, mut queued) = Services::detached(test_world());
        let (mut client, task) = connect(&services, 1);
        client.write_all(NEW_CHARACTER.as_bytes()).await.unwrap();
        read_until(&mut client, "Exits:").await;

        let rey = {
            let world = lock_world(&services.world);
            let id = world.find_player("Rey").unwrap();
            assert!(world.entity(id).unwrap().is_connected());
            assert_eq!(world.client(1).unwrap().entity, Some(id));
            id
        };

        client.write_all(b"say hello there\n").await.unwrap();
        match next_queued(&mut queued).await {
            QueuedCommand::Line { entity, line, trusted } => {
                assert_eq!(entity, rey);
                assert_eq!(line, "say hello there");
                assert!(!trusted);
            }
            other => panic!("unexpected {:?}", other),
        }

        drop(client);
        task.await.unwrap();
        let world = lock_world(&services.world);
        assert!(world.client(1).is_none());
        let body = world.entity(rey).unwrap();
        assert!(!body.is_connected());
    }

    #[tokio::test]
    async fn test_editor_holds_output_until_saved() {
        let (services, mut queued) = Services::detached(test_world());
        let (mut client, task) = connect(&services, 1);
        client.write_all(NEW_CHARACTER.as_bytes()).await.unwrap();
        read_until(&mut client, "Exits:").await;

        let sender = lock_world(&services.world).client(1).unwrap().sender();
        sender
            .send(Outbound::Edit { target: EditTarget::CharDesc, initial: "Old text".into() })
            .unwrap();
        read_until(&mut client, "Old text").await;
        sender.send(Outbound::Text("Someone waves.\r\n".into())).unwrap();

        client.write_all(b"  indented line\n@\n").await.unwrap();
        match next_queued(&mut queued).await {
            QueuedCommand::EditFinished { target, text, .. } => {
                assert_eq!(target, EditTarget::CharDesc);
                assert_eq!(text.as_deref(), Some("Old text\r\n  indented line"));
            }
            other => panic!("unexpected {:?}", other),
        }
        read_until(&mut client, "Someone waves.").await;

        sender.send(Outbound::Close).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_second_login_takes_over_the_body() {
        let (services, _queued) = Services::detached(test_world());
        let (mut first, first_task) = connect(&services, 1);
        first.write_all(NEW_CHARACTER.as_bytes()).await.unwrap();
        read_until(&mut first, "Exits:").await;

        // Log in again under the same name with the stored hash
        let profile = {
            let world = lock_world(&services.world);
            let id = world.find_player("Rey").unwrap();
            world.entity(id).unwrap().to_profile().unwrap()
        };
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = {
            let mut world = lock_world(&services.world);
            world.add_client(ClientRecord::new(2, None, tx.clone()));
            enter_world(&mut world, &services, 2, &tx, Login { profile, created: false }).unwrap()
        };

        read_until(&mut first, "connected from elsewhere").await;
        first_task.await.unwrap();

        let world = lock_world(&services.world);
        assert_eq!(world.entities().filter(|e| e.name() == "Rey").count(), 1);
        assert_eq!(world.client(2).unwrap().entity, Some(id));
        let session = world.entity(id).unwrap().player().unwrap().session.as_ref().unwrap();
        assert_eq!(session.client_id, 2);
    }

    #[tokio::test]
    async fn test_dead_character_respawns_on_entry() {
        let (services, _queued) = Services::detached(test_world());
        let mut profile = crate::persistence::store::tests::profile("Finn");
        profile.char.room = 101;
        profile.char.state = mud_shared::EntityState::Dead;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut world = lock_world(&services.world);
        world.add_client(ClientRecord::new(9, None, tx.clone()));
        let id = enter_world(&mut world, &services, 9, &tx, Login { profile, created: false }).unwrap();

        let finn = world.entity(id).unwrap();
        assert!(!finn.is_dead());
        assert_eq!(finn.char.room, services.config.start_room);
        assert!(matches!(rx.try_recv(), Ok(Outbound::Text(_))));
    }

    #[tokio::test]
    async fn test_new_character_cannot_take_over_live_body() {
        let (services, _queued) = Services::detached(test_world());
        let mut world = lock_world(&services.world);
        let mut first = crate::persistence::store::tests::profile("Rey");
        first.password = "hash-of-a".into();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        world.add_client(ClientRecord::new(1, None, tx_a.clone()));
        let rey = enter_world(&mut world, &services, 1, &tx_a, Login { profile: first, created: true }).unwrap();
        while rx_a.try_recv().is_ok() {}

        let mut second = crate::persistence::store::tests::profile("Rey");
        second.password = "hash-of-b".into();
        let (tx_b, _rx_b) = mpsc::unbounded_channel();
        world.add_client(ClientRecord::new(2, None, tx_b.clone()));
        let result = enter_world(&mut world, &services, 2, &tx_b, Login { profile: second, created: true });

        assert!(matches!(result, Err(MudError::Auth(_))));
        assert!(rx_a.try_recv().is_err());
        assert_eq!(world.client(1).unwrap().entity, Some(rey));
        assert_eq!(world.client(2).unwrap().entity, None);
        let body = world.entity(rey).unwrap();
        assert_eq!(body.player().unwrap().session.as_ref().unwrap().client_id, 1);
        assert_eq!(body.to_profile().unwrap().password, "hash-of-a");
    }

    #[tokio::test]
    async fn test_entering_resets_idle() {
        let (services, _queued) = Services::detached(test_world());
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut world = lock_world(&services.world);
        let mut record = ClientRecord::new(4, None, tx.clone());
        record.idle = 250;
        world.add_client(record);
        let profile = crate::persistence::store::tests::profile("Poe");
        enter_world(&mut world, &services, 4, &tx, Login { profile, created: false }).unwrap();
        assert_eq!(world.client(4).unwrap().idle, 0);
    }
}
