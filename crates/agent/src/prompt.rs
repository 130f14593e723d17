use tripdesk_core::domain::client::Client;

pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "\
You are the booking assistant of a travel agency, chatting with customers on Messenger.
Answer in the customer's language, briefly and politely.

Rules:
- Only state trips, prices, times and seat counts that an operation returned. Never invent them.
- Use search_trips or list_trips before answering questions about availability.
- Collect the number of passengers and a contact phone number before creating a booking.
- Read the booking details back to the customer and wait for an explicit yes before calling confirm_booking.
- Prices are in Tunisian dinars unless a trip says otherwise.
- If an operation returns an error, explain the problem in plain words and offer an alternative.";

/// The base instruction followed by what the oracle needs to act for this customer.
pub fn system_instruction_for(base: &str, client: &Client) -> String {
    let mut instruction = format!(
        "{base}\n\nCurrent customer: client_id={}, channel_identity={}",
        client.id, client.channel_identity
    );
    if let Some(name) = &client.name {
        instruction.push_str(&format!(", name={name}"));
    }
    if let Some(phone) = &client.phone_number {
        instruction.push_str(&format!(", phone_number={phone}"));
    }
    instruction
}
