// ABOUTME: Flow states of the conversational provisioning session.
// ABOUTME: Events are matched against the current state; everything else is ignored.

/// Current step of one session's conversation.
///
/// The SSH branch runs `MainMenu -> SshMenu -> {ChooseKeyType ->
/// GetPassphrase -> KeysReady} | {GetExistingPublicKey}` and then the common
/// tail `GetServerInfo -> WaitForPassword <-> WaitFor2fa` until the export
/// attempt reaches a terminal outcome and the session returns to `MainMenu`.
/// The hash branch is independent of the SSH branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowState {
    #[default]
    MainMenu,
    SshMenu,
    ChooseKeyType,
    GetPassphrase,
    /// Keys were generated and delivered; the user may export them.
    KeysReady,
    GetExistingPublicKey,
    GetServerInfo,
    /// Supervisory state while a provisioning attempt runs. The password
    /// reply arrives here, and challenge rounds bounce back to it.
    WaitForPassword,
    /// The next reply is a challenge response, not flow input.
    WaitFor2fa,
    HashMenu,
    ChooseHashAlgorithm,
    HashInput,
}
