use crate::config::validate_configs;
use crate::prelude::*;
use crate::shutdown;

/// The reactor: one `mio::Poll` instance, a set of listening sockets (one
/// per distinct host:port a server config binds), and the connections and
/// CGI pipes currently attached to it. Everything runs on a single thread —
/// readiness notifications drive all I/O, nothing blocks.
pub struct Server {
    listeners: HashMap<Token, TcpListener>,
    listener_configs: HashMap<Token, Vec<Arc<ServerConfig>>>,
    pub connections: HashMap<Token, HttpConnection>,
    pub cgi_to_client: HashMap<Token, Token>,
    pub zombie_purgatory: Vec<std::process::Child>,
    next_token: usize,
}

impl Server {
    /// Validates the parsed configuration and binds a listener for every
    /// distinct host:port pair it names. Server configs that share a
    /// host:port (virtual hosting) are grouped under the same listener
    /// token so an accepted connection carries the full candidate list for
    /// `Host`-based resolution.
    pub fn new(config: AppConfig, poll: &Poll) -> Result<Server> {
        let servers = validate_configs(config.servers);
        let arc_servers: Vec<Arc<ServerConfig>> = servers.into_iter().map(Arc::new).collect();

        let mut listeners = HashMap::new();
        let mut listener_configs: HashMap<Token, Vec<Arc<ServerConfig>>> = HashMap::new();
        let mut bound: HashMap<(String, u16), Token> = HashMap::new();
        let mut next_token = 0usize;

        for s_cfg in &arc_servers {
            for &port in &s_cfg.ports {
                let key = (s_cfg.host.clone(), port);
                let token = match bound.get(&key) {
                    Some(&t) => t,
                    None => {
                        let addr: SocketAddr = format!("{}:{}", s_cfg.host, port).parse()?;
                        let mut listener = TcpListener::bind(addr)?;
                        let token = Token(next_token);
                        next_token += 1;
                        poll.registry()
                            .register(&mut listener, token, Interest::READABLE)?;
                        info!("listening on {}", addr);
                        listeners.insert(token, listener);
                        bound.insert(key, token);
                        token
                    }
                };
                listener_configs
                    .entry(token)
                    .or_insert_with(Vec::new)
                    .push(Arc::clone(s_cfg));
            }
        }

        Ok(Server {
            listeners,
            listener_configs,
            connections: HashMap::new(),
            cgi_to_client: HashMap::new(),
            zombie_purgatory: Vec::new(),
            next_token,
        })
    }

    /// Runs the event loop until a shutdown signal arrives or the process is
    /// killed. Each iteration drains readiness events, then sweeps idle
    /// connections/CGI processes on a 1s cadence so timeouts fire even under
    /// low traffic. `shutdown::requested()` is the only cross-context state
    /// a signal handler mutates; once set, the loop closes every connection
    /// and listener fd and returns cleanly.
    pub fn run(&mut self, mut poll: Poll) -> Result<()> {
        let mut events = Events::with_capacity(1024);

        while !shutdown::requested() {
            poll.poll(&mut events, Some(Duration::from_secs(1)))?;

            if shutdown::requested() {
                break;
            }

            for event in events.iter() {
                let token = event.token();

                if self.listeners.contains_key(&token) {
                    self.accept_connections(&poll, token);
                    continue;
                }

                if let Some(&client_token) = self.cgi_to_client.get(&token) {
                    self.dispatch_cgi_event(&poll, token, client_token, event);
                    continue;
                }

                self.dispatch_client_event(&poll, token, event)?;
            }

            timeouts::process(self, &poll);
            self.reap_zombies();
        }

        info!("shutdown signal received, closing {} connections", self.connections.len());
        for (_, mut conn) in self.connections.drain() {
            let _ = poll.registry().deregister(&mut conn.stream);
            let _ = conn.stream.shutdown(Shutdown::Both);
        }
        for (_, mut listener) in self.listeners.drain() {
            let _ = poll.registry().deregister(&mut listener);
        }

        Ok(())
    }

    fn accept_connections(&mut self, poll: &Poll, listener_token: Token) {
        loop {
            let accepted = match self.listeners.get(&listener_token) {
                Some(listener) => listener.accept(),
                None => break,
            };

            match accepted {
                Ok((mut stream, addr)) => {
                    let token = Token(self.next_token);
                    self.next_token += 1;

                    if poll
                        .registry()
                        .register(&mut stream, token, Interest::READABLE)
                        .is_err()
                    {
                        continue;
                    }

                    let config_list = self
                        .listener_configs
                        .get(&listener_token)
                        .cloned()
                        .unwrap_or_default();

                    let mut conn = HttpConnection::new(stream, config_list);
                    conn.touch();
                    debug!("accepted connection from {}", addr);
                    self.connections.insert(token, conn);
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(_) => break,
            }
        }
    }

    fn dispatch_client_event(&mut self, poll: &Poll, token: Token, event: &Event) -> Result<()> {
        let mut next_token = self.next_token;

        let should_close = {
            let Some(conn) = self.connections.get_mut(&token) else {
                return Ok(());
            };
            conn.touch();

            if event.is_readable() {
                HttpConnection::handle_read_phase(
                    conn,
                    poll,
                    token,
                    &mut next_token,
                    &mut self.cgi_to_client,
                )?;
            }
            if !conn.closed && event.is_writable() {
                HttpConnection::handle_write_phase(
                    conn,
                    poll,
                    token,
                    &mut next_token,
                    &mut self.cgi_to_client,
                )?;
            }
            conn.should_close()
        };

        self.next_token = next_token;

        if should_close {
            HttpConnection::terminate_connection(self, token);
        }
        Ok(())
    }

    fn dispatch_cgi_event(&mut self, poll: &Poll, cgi_token: Token, client_token: Token, event: &Event) {
        let should_close = {
            let Some(conn) = self.connections.get_mut(&client_token) else {
                return;
            };
            let _ = handle_cgi_event(poll, event, cgi_token, client_token, conn, &mut self.cgi_to_client);
            conn.should_close()
        };

        if should_close {
            HttpConnection::terminate_connection(self, client_token);
        }
    }

    fn reap_zombies(&mut self) {
        self.zombie_purgatory
            .retain_mut(|child| !matches!(child.try_wait(), Ok(Some(_))));
    }
}
