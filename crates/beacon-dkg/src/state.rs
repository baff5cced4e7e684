//! The ceremony's phase, advanced explicitly by the driver in
//! `participant` rather than inferred from message traffic, so a late
//! or duplicate packet can be rejected by phase alone.

/// A DKG or resharing ceremony's current phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No deal has been produced yet.
    Idle,
    /// This node has dealt and is waiting on other dealers' deals.
    Dealing,
    /// At least one other dealer's deal has arrived; responses
    /// (approvals or complaints) are being exchanged as the rest of the
    /// deals trickle in. A stalled response window moves the ceremony
    /// to `Aborted` once below the qualification threshold.
    Responding,
    /// At least one complaint is outstanding; waiting on the accused
    /// dealer's justification before the qualified set can be fixed.
    Justifying,
    /// The qualified set is final and a share has been derived.
    Finished,
    /// The ceremony could not produce a usable share.
    Aborted,
}
