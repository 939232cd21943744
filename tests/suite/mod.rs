mod live_turn;
mod persistence;
mod skills;
