/// Auth-token acquisition/refresh lives entirely outside this workspace
/// (`spec.md` §1); the engine only needs to be told when a token changes
/// so it can forward it to the transport.
pub trait AuthTokenProvider {
    /// Register a listener invoked with the current token whenever it
    /// changes (including once, near registration time, with whatever
    /// token is already available).
    fn add_token_change_listener(&mut self, listener: Box<dyn FnMut(Option<String>)>);
}
