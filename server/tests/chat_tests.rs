//! End-to-End-Tests: echter TCP-Listener auf 127.0.0.1:0, Clients via flurfunk-client

use std::net::SocketAddr;
use std::time::Duration;

use flurfunk_client::{ChatClient, ClientError};
use flurfunk_protocol::ServerNachricht;
use flurfunk_server::{config::ServerConfig, LaufenderServer, Server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

// ---------------------------------------------------------------------------
// Hilfsfunktionen
// ---------------------------------------------------------------------------

async fn server_starten(
    anpassen: impl FnOnce(&mut ServerConfig),
) -> (LaufenderServer, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("Temp-Verzeichnis");
    let mut config = ServerConfig::default();
    config.netzwerk.bind_adresse = "127.0.0.1".into();
    config.netzwerk.tcp_port = 0;
    config.observability.aktiviert = false;
    config.dateien.verzeichnis = dir.path().join("ablage");
    anpassen(&mut config);

    let server = Server::neu(config).binden().await.expect("Server-Start");
    (server, dir)
}

/// Verbindet und wartet, bis die eigene Teilnehmerliste angekommen ist
async fn anmelden(addr: SocketAddr, nickname: &str) -> ChatClient {
    let mut client = ChatClient::verbinden(addr, nickname)
        .await
        .expect("Verbindung")
        .mit_timeout(Duration::from_secs(3));
    client
        .warten_auf(|n| matches!(n, ServerNachricht::UserList { users } if users.iter().any(|u| u == nickname)))
        .await
        .expect("Eigene Teilnehmerliste");
    client
}

fn ist_liste_mit(anzahl: usize) -> impl Fn(&ServerNachricht) -> bool {
    move |n| matches!(n, ServerNachricht::UserList { users } if users.len() == anzahl)
}

fn system_text(nachricht: &ServerNachricht) -> Option<&str> {
    match nachricht {
        ServerNachricht::SystemMessage { message, .. } => Some(message),
        _ => None,
    }
}

/// Verwirft alles Gepufferte und alles, was kurzfristig noch eintrifft
async fn leeren(client: &mut ChatClient) {
    while let Ok(Ok(_)) =
        tokio::time::timeout(Duration::from_millis(200), client.naechste_nachricht()).await
    {}
}

/// Prueft, dass innerhalb kurzer Zeit nichts Passendes ankommt
async fn nichts_passendes(client: &mut ChatClient, pruefen: impl Fn(&ServerNachricht) -> bool) {
    let ergebnis = tokio::time::timeout(Duration::from_millis(300), client.warten_auf(pruefen)).await;
    assert!(
        !matches!(ergebnis, Ok(Ok(_))),
        "Unerwartet empfangen: {ergebnis:?}"
    );
}

// ---------------------------------------------------------------------------
// Beitritt und Chat
// ---------------------------------------------------------------------------

#[tokio::test]
async fn teilnehmerliste_nach_n_beitritten() {
    let (server, _dir) = server_starten(|_| {}).await;
    let addr = server.adresse();

    let namen = ["Alice", "Bob", "Cara", "Dora"];
    let mut clients = Vec::new();
    for name in namen {
        clients.push(anmelden(addr, name).await);
    }

    let liste = clients[0].warten_auf(ist_liste_mit(4)).await.unwrap();
    assert_eq!(
        liste,
        ServerNachricht::UserList {
            users: namen.iter().map(|n| n.to_string()).collect()
        }
    );

    server.stoppen().await.unwrap();
}

#[tokio::test]
async fn chatnachricht_erreicht_alle_mit_zeitstempel() {
    let (server, _dir) = server_starten(|_| {}).await;
    let addr = server.adresse();
    let mut alice = anmelden(addr, "Alice").await;
    let mut bob = anmelden(addr, "Bob").await;

    alice.text_senden("Mahlzeit!").await.unwrap();

    for client in [&mut alice, &mut bob] {
        let nachricht = client
            .warten_auf(|n| matches!(n, ServerNachricht::TextMessage { .. }))
            .await
            .unwrap();
        let ServerNachricht::TextMessage {
            sender,
            message,
            time,
        } = nachricht
        else {
            unreachable!()
        };
        assert_eq!(sender, "Alice");
        assert_eq!(message, "Mahlzeit!");
        assert_eq!(time.len(), 5);
        assert_eq!(time.as_bytes()[2], b':');
    }

    server.stoppen().await.unwrap();
}

#[tokio::test]
async fn fluestern_alice_bob_cara() {
    let (server, _dir) = server_starten(|_| {}).await;
    let addr = server.adresse();
    let mut alice = anmelden(addr, "Alice").await;
    let mut bob = anmelden(addr, "Bob").await;
    let mut cara = anmelden(addr, "Cara").await;

    bob.fluestern("Cara", "hi").await.unwrap();

    let bei_cara = cara
        .warten_auf(|n| matches!(n, ServerNachricht::Whisper { .. }))
        .await
        .unwrap();
    assert!(matches!(
        bei_cara,
        ServerNachricht::Whisper { ref sender, ref message, .. } if sender == "Bob" && message == "hi"
    ));

    let ist_whisper = |n: &ServerNachricht| matches!(n, ServerNachricht::Whisper { .. });
    nichts_passendes(&mut alice, ist_whisper).await;
    nichts_passendes(&mut bob, ist_whisper).await;

    server.stoppen().await.unwrap();
}

#[tokio::test]
async fn fluestern_an_unbekannt_ohne_antwort() {
    let (server, _dir) = server_starten(|_| {}).await;
    let addr = server.adresse();
    let mut alice = anmelden(addr, "Alice").await;
    leeren(&mut alice).await;

    alice.fluestern("Zoe", "bist du da?").await.unwrap();
    nichts_passendes(&mut alice, |_| true).await;

    server.stoppen().await.unwrap();
}

#[tokio::test]
async fn zwei_umschlaege_in_einem_paket() {
    let (server, _dir) = server_starten(|_| {}).await;
    let addr = server.adresse();
    let mut beobachter = anmelden(addr, "Beobachter").await;

    let mut roh = TcpStream::connect(addr).await.unwrap();
    roh.write_all(
        br#"{"nickname":"Roh"}{"type":"TEXT_MESSAGE","message":"a{b"}{"type":"TEXT_MESSAGE","message":"c\"}"}"#,
    )
    .await
    .unwrap();

    let mut texte = Vec::new();
    while texte.len() < 2 {
        if let ServerNachricht::TextMessage { sender, message, .. } =
            beobachter.naechste_nachricht().await.unwrap()
        {
            assert_eq!(sender, "Roh");
            texte.push(message);
        }
    }
    assert_eq!(texte, vec!["a{b", "c\"}"]);

    server.stoppen().await.unwrap();
}

// ---------------------------------------------------------------------------
// Trennen
// ---------------------------------------------------------------------------

#[tokio::test]
async fn abrupter_abbruch_ein_abschied_und_liste() {
    let (server, _dir) = server_starten(|_| {}).await;
    let addr = server.adresse();
    let mut alice = anmelden(addr, "Alice").await;
    let mut bob = anmelden(addr, "Bob").await;
    let cara = anmelden(addr, "Cara").await;
    for client in [&mut alice, &mut bob] {
        client.warten_auf(ist_liste_mit(3)).await.unwrap();
        leeren(client).await;
    }

    drop(cara);

    for client in [&mut alice, &mut bob] {
        let abschied = client.naechste_nachricht().await.unwrap();
        assert_eq!(system_text(&abschied), Some("Cara left the chat"));
        assert_eq!(
            client.naechste_nachricht().await.unwrap(),
            ServerNachricht::UserList {
                users: vec!["Alice".into(), "Bob".into()]
            }
        );
        nichts_passendes(client, |n| system_text(n).is_some()).await;
    }

    server.stoppen().await.unwrap();
}

#[tokio::test]
async fn geordnetes_trennen() {
    let (server, _dir) = server_starten(|_| {}).await;
    let addr = server.adresse();
    let mut alice = anmelden(addr, "Alice").await;
    let bob = anmelden(addr, "Bob").await;

    bob.trennen().await.unwrap();

    let abschied = alice
        .warten_auf(|n| system_text(n).is_some_and(|t| t.ends_with("left the chat")))
        .await
        .unwrap();
    assert_eq!(system_text(&abschied), Some("Bob left the chat"));

    server.stoppen().await.unwrap();
}

#[tokio::test]
async fn leerer_nickname_wird_abgewiesen() {
    let (server, _dir) = server_starten(|_| {}).await;

    let ergebnis = ChatClient::verbinden(server.adresse(), "   ").await;
    assert!(matches!(ergebnis, Err(ClientError::HandshakeAbgelehnt)));

    server.stoppen().await.unwrap();
}

#[tokio::test]
async fn client_limit() {
    let (server, _dir) = server_starten(|c| c.server.max_clients = 1).await;
    let addr = server.adresse();
    let _alice = anmelden(addr, "Alice").await;

    let mut zweiter = TcpStream::connect(addr).await.unwrap();
    let _ = zweiter.write_all(br#"{"nickname":"Bob"}"#).await;
    let mut puffer = [0u8; 64];
    let gelesen = tokio::time::timeout(Duration::from_secs(2), zweiter.read(&mut puffer))
        .await
        .expect("Server sollte die Verbindung schliessen");
    assert!(matches!(gelesen, Ok(0) | Err(_)));

    server.stoppen().await.unwrap();
}

#[tokio::test]
async fn shutdown_trennt_clients() {
    let (server, _dir) = server_starten(|c| c.limits.shutdown_grace_sek = 2).await;
    let mut alice = anmelden(server.adresse(), "Alice").await;

    server.stoppen().await.unwrap();

    let fehler = loop {
        if let Err(e) = alice.naechste_nachricht().await {
            break e;
        }
    };
    assert!(matches!(
        fehler,
        ClientError::VerbindungGetrennt | ClientError::Io(_)
    ));
}

// ---------------------------------------------------------------------------
// Dateien
// ---------------------------------------------------------------------------

#[tokio::test]
async fn upload_und_download_bytegleich() {
    let (server, dir) = server_starten(|_| {}).await;
    let addr = server.adresse();
    let mut alice = anmelden(addr, "Alice").await;
    let mut bob = anmelden(addr, "Bob").await;

    let daten: Vec<u8> = (0..300_000u32).map(|i| (i % 253) as u8).collect();
    let quelle = dir.path().join("Urlaub #1.jpg");
    std::fs::write(&quelle, &daten).unwrap();

    let name = alice.datei_hochladen(&quelle, None).await.unwrap();
    assert_eq!(name, "Urlaub 1.jpg");

    let angekuendigt = bob
        .warten_auf(|n| matches!(n, ServerNachricht::FileAvailable { .. }))
        .await
        .unwrap();
    assert!(matches!(
        angekuendigt,
        ServerNachricht::FileAvailable { ref filename, size, ref sender, private: false, .. }
            if filename == "Urlaub 1.jpg" && size == daten.len() as u64 && sender == "Alice"
    ));

    let mut empfangen = Vec::new();
    let size = bob
        .datei_herunterladen("Urlaub 1.jpg", &mut empfangen)
        .await
        .unwrap();
    assert_eq!(size, daten.len() as u64);
    assert_eq!(empfangen, daten);
    assert_eq!(
        std::fs::read(dir.path().join("ablage").join("Urlaub 1.jpg")).unwrap(),
        daten
    );

    // Danach bleibt der Stream synchron
    bob.text_senden("danke").await.unwrap();
    alice
        .warten_auf(|n| matches!(n, ServerNachricht::TextMessage { message, .. } if message == "danke"))
        .await
        .unwrap();

    server.stoppen().await.unwrap();
}

#[tokio::test]
async fn private_datei_nur_fuer_absender_und_ziel() {
    let (server, _dir) = server_starten(|_| {}).await;
    let addr = server.adresse();
    let mut alice = anmelden(addr, "Alice").await;
    let mut bob = anmelden(addr, "Bob").await;
    let mut cara = anmelden(addr, "Cara").await;

    alice
        .daten_hochladen("notiz.txt", b"nur fuer Cara", Some("Cara"))
        .await
        .unwrap();

    let ist_datei = |n: &ServerNachricht| matches!(n, ServerNachricht::FileAvailable { .. });
    for client in [&mut alice, &mut cara] {
        let nachricht = client.warten_auf(ist_datei).await.unwrap();
        assert!(matches!(nachricht, ServerNachricht::FileAvailable { private: true, .. }));
    }
    nichts_passendes(&mut bob, ist_datei).await;

    server.stoppen().await.unwrap();
}

#[tokio::test]
async fn zu_grosse_datei_abgelehnt() {
    let (server, _dir) = server_starten(|c| c.dateien.max_bytes = 10).await;
    let mut alice = anmelden(server.adresse(), "Alice").await;

    let ergebnis = alice
        .daten_hochladen("gross.bin", &[0u8; 11], None)
        .await;
    assert!(matches!(ergebnis, Err(ClientError::UploadAbgelehnt(_))));

    // Verbindung bleibt nutzbar
    alice.text_senden("noch da").await.unwrap();
    alice
        .warten_auf(|n| matches!(n, ServerNachricht::TextMessage { .. }))
        .await
        .unwrap();

    server.stoppen().await.unwrap();
}

#[tokio::test]
async fn download_unbekannter_datei_bleibt_still() {
    let (server, _dir) = server_starten(|_| {}).await;
    let addr = server.adresse();
    let alice = anmelden(addr, "Alice").await;
    let mut alice = alice.mit_timeout(Duration::from_millis(300));

    let mut ziel = Vec::new();
    let ergebnis = alice.datei_herunterladen("fehlt.txt", &mut ziel).await;
    assert!(matches!(ergebnis, Err(ClientError::Timeout)));
    assert!(ziel.is_empty());

    server.stoppen().await.unwrap();
}
