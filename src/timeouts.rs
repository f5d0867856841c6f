

use crate::prelude::*;

/// Sweeps idle connections and stalled CGI processes: a process that never
/// produces output or exits is killed rather than wedging the connection
/// open forever.
pub fn process(server: &mut Server, poll: &Poll) {
    let now = Instant::now();
    let cgi_to_client = &mut server.cgi_to_client;

    server.connections.retain(|token, conn| {
        if now.duration_since(conn.last_activity) > CLIENT_TIMEOUT {
            cleanup_connection(conn, poll);
            force_cgi_timeout(conn, cgi_to_client);
            return false;
        }

        if let ActiveAction::Cgi { start_time, .. } = &conn.action {
            if start_time.elapsed().as_secs() > TIMEOUT_CGI {
                force_cgi_timeout(conn, cgi_to_client);

                poll.registry()
                    .reregister(&mut conn.stream, *token, Interest::WRITABLE)
                    .ok();
            }
        }

        true
    });
}
fn cleanup_connection(conn: &mut HttpConnection, poll: &Poll) {
    let _ = poll.registry().deregister(&mut conn.stream);
    let _ = conn.stream.shutdown(Shutdown::Both);
}
