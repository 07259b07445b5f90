use crate::models::AppointmentRow;

/// Stand-in for client notification. Staff flip the `notified` marker by hand;
/// nothing is delivered from here.
pub fn appointment_notified(appointment: &AppointmentRow) {
    log::info!(
        "Client {} marked as notified about appointment {} ({} on {} at {})",
        appointment.client_name,
        appointment.id,
        appointment.status.label(),
        appointment.date,
        appointment.time.format("%H:%M")
    );
}
